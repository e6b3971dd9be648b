//! Trusted origins
//!
//! The only origin that may be used for an authorization decision is the
//! one the transport attaches to a message (for example the browser-validated
//! `event.origin` of a cross-document message). A `TrustedOrigin` can only
//! be produced by [`OriginAuthenticator`] from that channel-level value; it
//! deliberately does not implement `Deserialize`, so it can never be read
//! out of a command payload.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use url::{Host, Url};

use crate::error::SecurityError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TrustedOrigin(String);

impl TrustedOrigin {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this origin may open a session at all
    pub fn is_secure(&self) -> bool {
        is_secure_origin(&self.0)
    }
}

impl fmt::Display for TrustedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrustedOrigin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A payload paired with the origin its transport vouched for
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: TrustedOrigin,
    pub payload: Value,
}

pub struct OriginAuthenticator;

impl OriginAuthenticator {
    /// Turn the transport-supplied sender origin into a `TrustedOrigin`.
    ///
    /// The value is normalised to its `scheme://host[:port]` serialisation.
    /// Opaque origins (`null`, `data:`, `file:`) are refused.
    pub fn attest(transport_origin: &str) -> Result<TrustedOrigin> {
        origin_of_url(transport_origin)
            .map(TrustedOrigin)
            .ok_or_else(|| SecurityError::UntrustedOrigin(transport_origin.to_string()))
    }

    /// Attach the trusted origin to an inbound payload.
    ///
    /// Any `origin` field inside the payload is ignored for authorization;
    /// a mismatch is logged because it usually means a confused or hostile
    /// caller.
    pub fn authenticate(transport_origin: &str, payload: Value) -> Result<InboundMessage> {
        let origin = Self::attest(transport_origin)?;

        if let Some(declared) = payload.get("origin").and_then(Value::as_str) {
            if origin_of_url(declared).as_deref() != Some(origin.as_str()) {
                tracing::warn!(
                    trusted = %origin,
                    declared = %declared,
                    "Ignoring payload-declared origin"
                );
            }
        }

        Ok(InboundMessage { origin, payload })
    }
}

/// Serialised origin of a URL, or `None` for opaque origins and parse failures
pub fn origin_of_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// True only for HTTPS origins and plain-HTTP loopback origins
pub fn is_secure_origin(origin: &str) -> bool {
    let parsed = match Url::parse(origin.trim()) {
        Ok(u) => u,
        Err(_) => return false,
    };

    match parsed.scheme() {
        "https" => parsed.host().is_some(),
        "http" => match parsed.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secure_origins() {
        assert!(is_secure_origin("https://a.com"));
        assert!(is_secure_origin("http://localhost:3000"));
        assert!(is_secure_origin("http://127.0.0.1:8080"));
        assert!(is_secure_origin("http://[::1]:8080"));

        assert!(!is_secure_origin("http://a.com"));
        assert!(!is_secure_origin("http://localhost.evil.com"));
        assert!(!is_secure_origin("ftp://a.com"));
        assert!(!is_secure_origin("not an origin"));
    }

    #[test]
    fn test_attest_normalises() {
        let origin = OriginAuthenticator::attest("https://App.com:443/some/path?q=1").unwrap();
        assert_eq!(origin.as_str(), "https://app.com");

        let origin = OriginAuthenticator::attest("http://localhost:3000").unwrap();
        assert_eq!(origin.as_str(), "http://localhost:3000");
    }

    #[test]
    fn test_attest_rejects_opaque() {
        assert!(matches!(
            OriginAuthenticator::attest("null"),
            Err(SecurityError::UntrustedOrigin(_))
        ));
        assert!(OriginAuthenticator::attest("data:text/html,hi").is_err());
    }

    #[test]
    fn test_payload_origin_is_ignored() {
        let message = OriginAuthenticator::authenticate(
            "https://evil.com",
            json!({ "origin": "https://app.com", "type": "connect" }),
        )
        .unwrap();

        assert_eq!(message.origin.as_str(), "https://evil.com");
    }

    #[test]
    fn test_origin_of_url() {
        assert_eq!(
            origin_of_url("https://bank.com/login").as_deref(),
            Some("https://bank.com")
        );
        assert_eq!(
            origin_of_url("http://example.com:8080/").as_deref(),
            Some("http://example.com:8080")
        );
        assert_eq!(origin_of_url("about:blank"), None);
    }
}
