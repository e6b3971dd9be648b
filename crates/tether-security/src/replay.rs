//! Replay protection
//!
//! Every command carries a single-use nonce. Used nonces are kept in a
//! bounded cache; once it exceeds its capacity the oldest-inserted entries
//! are evicted first. Eviction is by insertion order only, so this bounds
//! memory but is not a time-based replay window: an evicted nonce would be
//! accepted again.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::error::SecurityError;
use crate::Result;

pub const DEFAULT_NONCE_CAPACITY: usize = 10_000;

struct NonceCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

pub struct ReplayGuard {
    cache: Arc<Mutex<NonceCache>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NONCE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Arc::new(Mutex::new(NonceCache {
                seen: HashSet::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Record a nonce as used.
    ///
    /// Returns false for an empty nonce or one that is already in the cache.
    pub fn consume(&self, nonce: &str) -> bool {
        if nonce.is_empty() {
            return false;
        }

        let mut cache = self.cache.lock();
        if !cache.seen.insert(nonce.to_string()) {
            return false;
        }
        cache.order.push_back(nonce.to_string());

        while cache.order.len() > cache.capacity {
            if let Some(oldest) = cache.order.pop_front() {
                cache.seen.remove(&oldest);
            }
        }

        true
    }

    /// `consume` with the rejection reason the protocol reports
    pub fn check(&self, nonce: Option<&str>) -> Result<()> {
        let nonce = match nonce {
            Some(n) if !n.is_empty() => n,
            _ => return Err(SecurityError::MissingNonce),
        };

        if self.consume(nonce) {
            Ok(())
        } else {
            tracing::warn!(nonce_prefix = %prefix(nonce), "Replayed nonce rejected");
            Err(SecurityError::ReplayDetected)
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every nonce (process restart)
    pub fn reset(&self) {
        let mut cache = self.cache.lock();
        cache.seen.clear();
        cache.order.clear();
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ReplayGuard {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

fn prefix(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}
