//! Permission error types

use thiserror::Error;

use crate::action::Action;

#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Permission denied: {action} on {target_origin}")]
    Denied {
        action: Action,
        target_origin: String,
    },

    #[error("Permission request timed out: {action} on {target_origin}")]
    Timeout {
        action: Action,
        target_origin: String,
    },

    #[error("No pending approval with id {0}")]
    UnknownApproval(String),

    #[error("Decision for approval {0} names the wrong session")]
    SessionMismatch(String),

    #[error("Approval UI unavailable: {0}")]
    ApprovalUnavailable(String),

    #[error("Session error: {0}")]
    Session(#[from] tether_session::SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] tether_storage::StorageError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
