//! Security error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Transport did not supply a usable origin: {0}")]
    UntrustedOrigin(String),

    #[error("Insecure origin refused: {0}")]
    InsecureOrigin(String),

    #[error("Request is missing a nonce")]
    MissingNonce,

    #[error("Nonce has already been used")]
    ReplayDetected,

    #[error("Session token missing")]
    TokenMissing,

    #[error("Session token is not recognised")]
    TokenInvalid,

    #[error("Session token has expired")]
    TokenExpired,

    #[error("Session token was issued to a different origin")]
    TokenOriginMismatch,
}
