//! Tether Security Primitives
//!
//! The checks every inbound command passes before it reaches session or
//! permission logic:
//! - Trusted origin, taken from the transport and never from the payload
//! - Single-use nonces (bounded FIFO cache)
//! - Session tokens bound to an origin, expiring after 24 hours
//! - Secure-origin gate for session creation (HTTPS or loopback only)

mod error;
mod origin;
mod replay;
mod token;

pub use error::SecurityError;
pub use origin::{is_secure_origin, origin_of_url, InboundMessage, OriginAuthenticator, TrustedOrigin};
pub use replay::{ReplayGuard, DEFAULT_NONCE_CAPACITY};
pub use token::{SessionToken, SessionTokenStore, TokenClaims, DEFAULT_TOKEN_TTL_SECS};

pub type Result<T> = std::result::Result<T, SecurityError>;
