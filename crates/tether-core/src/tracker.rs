//! In-flight request correlation
//!
//! Every command is recorded under its origin and `requestId` until its
//! response is produced, so the caller can match responses to requests
//! across hops. An origin cannot reuse one of its own ids while it is still
//! in flight. Records that outlive the TTL are pruned whenever a new request
//! is recorded.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use tether_security::TrustedOrigin;
use tether_session::TabId;

use crate::error::ProtocolError;

pub const DEFAULT_REQUEST_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: String,
    pub origin: String,
    pub timestamp: DateTime<Utc>,
    pub tab_id: Option<TabId>,
}

/// (origin, request id)
type RequestKey = (String, String);

pub struct RequestTracker {
    pending: Arc<RwLock<HashMap<RequestKey, PendingRequest>>>,
    ttl: Duration,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_REQUEST_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn begin(
        &self,
        request_id: &str,
        origin: &TrustedOrigin,
        tab_id: Option<TabId>,
    ) -> Result<(), ProtocolError> {
        self.begin_at(request_id, origin, tab_id, Utc::now())
    }

    pub fn begin_at(
        &self,
        request_id: &str,
        origin: &TrustedOrigin,
        tab_id: Option<TabId>,
        now: DateTime<Utc>,
    ) -> Result<(), ProtocolError> {
        let mut pending = self.pending.write();

        let cutoff = self.cutoff(now);
        pending.retain(|_, record| record.timestamp >= cutoff);

        let key = key(origin, request_id);
        if pending.contains_key(&key) {
            tracing::warn!(request_id = %request_id, origin = %origin, "Duplicate in-flight request id");
            return Err(ProtocolError::DuplicateRequest(request_id.to_string()));
        }

        pending.insert(
            key,
            PendingRequest {
                request_id: request_id.to_string(),
                origin: origin.as_str().to_string(),
                timestamp: now,
                tab_id,
            },
        );

        Ok(())
    }

    /// Stop tracking a request whose response is ready
    pub fn complete(&self, origin: &TrustedOrigin, request_id: &str) -> Option<PendingRequest> {
        self.pending.write().remove(&key(origin, request_id))
    }

    pub fn get(&self, origin: &TrustedOrigin, request_id: &str) -> Option<PendingRequest> {
        self.pending.read().get(&key(origin, request_id)).cloned()
    }

    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|_, record| record.timestamp >= cutoff);
        before - pending.len()
    }

    /// Records stamped before this are stale
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.pending.write().clear();
    }
}

fn key(origin: &TrustedOrigin, request_id: &str) -> RequestKey {
    (origin.as_str().to_string(), request_id.to_string())
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RequestTracker {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            ttl: self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_security::OriginAuthenticator;

    fn app() -> TrustedOrigin {
        OriginAuthenticator::attest("https://app.com").unwrap()
    }

    #[test]
    fn test_begin_and_complete() {
        let tracker = RequestTracker::new();
        tracker.begin("r-1", &app(), Some(3)).unwrap();

        let record = tracker.get(&app(), "r-1").unwrap();
        assert_eq!(record.origin, "https://app.com");
        assert_eq!(record.tab_id, Some(3));

        assert_eq!(tracker.complete(&app(), "r-1").unwrap().request_id, "r-1");
        assert!(tracker.is_empty());

        // Free to reuse once completed
        tracker.begin("r-1", &app(), None).unwrap();
    }

    #[test]
    fn test_duplicate_in_flight() {
        let tracker = RequestTracker::new();
        tracker.begin("r-1", &app(), None).unwrap();

        assert_eq!(
            tracker.begin("r-1", &app(), None),
            Err(ProtocolError::DuplicateRequest("r-1".into()))
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_same_id_from_another_origin() {
        let tracker = RequestTracker::new();
        let other = OriginAuthenticator::attest("https://other.com").unwrap();
        tracker.begin("r-1", &app(), Some(1)).unwrap();
        tracker.begin("r-1", &other, Some(2)).unwrap();

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.get(&other, "r-1").unwrap().tab_id, Some(2));

        tracker.complete(&other, "r-1").unwrap();
        assert_eq!(tracker.get(&app(), "r-1").unwrap().tab_id, Some(1));
    }

    #[test]
    fn test_stale_records_pruned_on_insert() {
        let tracker = RequestTracker::new();
        let t0 = Utc::now();

        tracker.begin_at("old", &app(), None, t0).unwrap();
        tracker
            .begin_at("new", &app(), None, t0 + Duration::minutes(61))
            .unwrap();

        assert!(tracker.get(&app(), "old").is_none());
        assert!(tracker.get(&app(), "new").is_some());

        // An expired id may be reused
        tracker
            .begin_at("old", &app(), None, t0 + Duration::minutes(62))
            .unwrap();
    }

    #[test]
    fn test_prune_expired() {
        let tracker = RequestTracker::with_ttl(Duration::seconds(10));
        let t0 = Utc::now();
        tracker.begin_at("a", &app(), None, t0).unwrap();
        tracker.begin_at("b", &app(), None, t0 + Duration::seconds(8)).unwrap();

        assert_eq!(tracker.prune_expired(t0 + Duration::seconds(15)), 1);
        assert_eq!(tracker.len(), 1);

        tracker.reset();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_unbounded_ttl_keeps_everything() {
        let tracker = RequestTracker::with_ttl(Duration::MAX);
        let t0 = Utc::now();
        tracker.begin_at("a", &app(), None, t0).unwrap();
        tracker.begin_at("b", &app(), None, t0 + Duration::days(1)).unwrap();

        assert_eq!(tracker.prune_expired(t0 + Duration::days(2)), 0);
        assert_eq!(tracker.len(), 2);
    }
}
