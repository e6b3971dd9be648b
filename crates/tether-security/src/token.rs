//! Session tokens
//!
//! Opaque bearer tokens handed out by the bootstrap `connect` command. A
//! token is bound to the session it was issued for and to the trusted
//! origin that asked for it, and stops validating 24 hours after issue.
//! Only a SHA-256 digest of each token is kept in memory.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::SecurityError;
use crate::origin::TrustedOrigin;
use crate::Result;

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    /// The bearer value; only ever returned to the caller once
    pub token: String,
    pub session_id: String,
    pub origin: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What a valid token proves about a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub session_id: String,
    pub origin: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    session_id: String,
    origin: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

pub struct SessionTokenStore {
    /// digest -> record
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>,
    ttl: Duration,
}

impl SessionTokenStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Issue a fresh token for `session_id`, bound to `origin`.
    ///
    /// Tokens already expired at issue time are dropped.
    pub fn issue(&self, session_id: &str, origin: &TrustedOrigin) -> SessionToken {
        self.issue_at(session_id, origin, Utc::now())
    }

    pub fn issue_at(
        &self,
        session_id: &str,
        origin: &TrustedOrigin,
        now: DateTime<Utc>,
    ) -> SessionToken {
        let token = generate_token();
        let record = TokenRecord {
            session_id: session_id.to_string(),
            origin: origin.as_str().to_string(),
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, existing| existing.expires_at >= now);
        let pruned = before - tokens.len();
        tokens.insert(digest(&token), record.clone());
        drop(tokens);

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired session tokens");
        }

        tracing::info!(
            session_id = %session_id,
            origin = %origin,
            expires_at = %record.expires_at,
            "Issued session token"
        );

        SessionToken {
            token,
            session_id: record.session_id,
            origin: record.origin,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }

    /// Check a token presented by a request whose trusted origin is `origin`
    pub fn validate(&self, token: Option<&str>, origin: &TrustedOrigin) -> Result<TokenClaims> {
        self.validate_at(token, origin, Utc::now())
    }

    pub fn validate_at(
        &self,
        token: Option<&str>,
        origin: &TrustedOrigin,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(SecurityError::TokenMissing),
        };

        let record = self
            .tokens
            .read()
            .get(&digest(token))
            .cloned()
            .ok_or(SecurityError::TokenInvalid)?;

        if now > record.expires_at {
            tracing::warn!(session_id = %record.session_id, "Expired session token presented");
            return Err(SecurityError::TokenExpired);
        }

        if record.origin != origin.as_str() {
            tracing::warn!(
                session_id = %record.session_id,
                bound = %record.origin,
                presented_by = %origin,
                "Session token used from another origin"
            );
            return Err(SecurityError::TokenOriginMismatch);
        }

        Ok(TokenClaims {
            session_id: record.session_id,
            origin: record.origin,
            expires_at: record.expires_at,
        })
    }

    /// Invalidate a single token; returns whether it existed
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(&digest(token)).is_some()
    }

    /// Drop every token that has expired as of `now`; returns how many
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, record| record.expires_at >= now);
        before - tokens.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.tokens.write().clear();
    }
}

impl Default for SessionTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionTokenStore {
    fn clone(&self) -> Self {
        Self {
            tokens: Arc::clone(&self.tokens),
            ttl: self.ttl,
        }
    }
}

/// 244 random bits from two v4 UUIDs (getrandom-backed), hex encoded
fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
