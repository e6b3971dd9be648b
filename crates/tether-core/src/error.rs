//! Core error types
//!
//! `CoreError` covers setup (configuration, storage). `ProtocolError` is
//! what a single command can fail with; it never escapes the router and is
//! always turned into an error response for that command.

use thiserror::Error;

use tether_permissions::PermissionError;
use tether_security::SecurityError;
use tether_session::{SessionError, TabId};

use crate::host::ExecutionError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] tether_storage::StorageError),

    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Insecure origin: {0}")]
    InsecureOrigin(String),

    #[error("Missing nonce")]
    MissingNonce,

    #[error("Replay detected")]
    ReplayDetected,

    #[error("Missing session token")]
    TokenMissing,

    #[error("Invalid session token")]
    TokenInvalid,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Session token origin mismatch")]
    TokenOriginMismatch,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Access denied to tab {0}")]
    TabAccessDenied(TabId),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Permission request timed out: {0}")]
    PermissionTimeout(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    ExecutionFailure(#[from] ExecutionError),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Duplicate request id: {0}")]
    DuplicateRequest(String),
}

impl ProtocolError {
    /// Stable machine-readable name, sent as `code` in error responses
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::InsecureOrigin(_) => "InsecureOrigin",
            ProtocolError::MissingNonce => "MissingNonce",
            ProtocolError::ReplayDetected => "ReplayDetected",
            ProtocolError::TokenMissing => "TokenMissing",
            ProtocolError::TokenInvalid => "TokenInvalid",
            ProtocolError::TokenExpired => "TokenExpired",
            ProtocolError::TokenOriginMismatch => "TokenOriginMismatch",
            ProtocolError::InvalidSession(_) => "InvalidSession",
            ProtocolError::TabAccessDenied(_) => "TabAccessDenied",
            ProtocolError::PermissionDenied(_) => "PermissionDenied",
            ProtocolError::PermissionTimeout(_) => "PermissionTimeout",
            ProtocolError::UnknownCommand(_) => "UnknownCommand",
            ProtocolError::ExecutionFailure(_) => "ExecutionFailure",
            ProtocolError::MalformedMessage(_) => "MalformedMessage",
            ProtocolError::DuplicateRequest(_) => "DuplicateRequest",
        }
    }
}

impl From<SecurityError> for ProtocolError {
    fn from(err: SecurityError) -> Self {
        match err {
            // An opaque or unparseable sender can never be a secure origin
            SecurityError::UntrustedOrigin(origin) | SecurityError::InsecureOrigin(origin) => {
                ProtocolError::InsecureOrigin(origin)
            }
            SecurityError::MissingNonce => ProtocolError::MissingNonce,
            SecurityError::ReplayDetected => ProtocolError::ReplayDetected,
            SecurityError::TokenMissing => ProtocolError::TokenMissing,
            SecurityError::TokenInvalid => ProtocolError::TokenInvalid,
            SecurityError::TokenExpired => ProtocolError::TokenExpired,
            SecurityError::TokenOriginMismatch => ProtocolError::TokenOriginMismatch,
        }
    }
}

impl From<SessionError> for ProtocolError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ProtocolError::InvalidSession(id),
            SessionError::InsecureOrigin(origin) => ProtocolError::InsecureOrigin(origin),
            SessionError::TabAlreadyOwned { tab_id } => ProtocolError::TabAccessDenied(tab_id),
        }
    }
}

impl From<PermissionError> for ProtocolError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Denied {
                action,
                target_origin,
            } => ProtocolError::PermissionDenied(format!("{action} on {target_origin}")),
            PermissionError::Timeout {
                action,
                target_origin,
            } => ProtocolError::PermissionTimeout(format!("{action} on {target_origin}")),
            PermissionError::Session(e) => e.into(),
            other => ProtocolError::PermissionDenied(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_permissions::Action;

    #[test]
    fn test_codes_match_names() {
        assert_eq!(ProtocolError::ReplayDetected.code(), "ReplayDetected");
        assert_eq!(ProtocolError::TabAccessDenied(3).code(), "TabAccessDenied");
        assert_eq!(
            ProtocolError::ExecutionFailure(ExecutionError::ElementNotFound("e1".into())).code(),
            "ExecutionFailure"
        );
    }

    #[test]
    fn test_security_errors_map_one_to_one() {
        assert_eq!(
            ProtocolError::from(SecurityError::TokenExpired),
            ProtocolError::TokenExpired
        );
        assert_eq!(
            ProtocolError::from(SecurityError::UntrustedOrigin("null".into())),
            ProtocolError::InsecureOrigin("null".into())
        );
    }

    #[test]
    fn test_permission_errors() {
        let denied = ProtocolError::from(PermissionError::Denied {
            action: Action::Navigate,
            target_origin: "https://bank.com".into(),
        });
        assert_eq!(
            denied,
            ProtocolError::PermissionDenied("navigate on https://bank.com".into())
        );

        let timeout = ProtocolError::from(PermissionError::Timeout {
            action: Action::Click,
            target_origin: "https://bank.com".into(),
        });
        assert_eq!(timeout.code(), "PermissionTimeout");

        let missing = ProtocolError::from(PermissionError::Session(SessionError::NotFound(
            "s-1".into(),
        )));
        assert_eq!(missing, ProtocolError::InvalidSession("s-1".into()));
    }

    #[test]
    fn test_execution_failure_passes_message_through() {
        let err = ProtocolError::from(ExecutionError::NotInputElement("e7".into()));
        assert_eq!(err.to_string(), ExecutionError::NotInputElement("e7".into()).to_string());
    }
}
