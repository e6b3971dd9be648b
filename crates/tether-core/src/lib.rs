//! Tether Core
//!
//! Entry point for commands arriving from a remote caller. Every command is
//! checked in a fixed order before anything touches the browser:
//! origin, nonce, session token, tab ownership, then permission.

mod config;
mod error;
mod host;
mod protocol;
mod router;
mod tracker;

pub use config::Config;
pub use error::{CoreError, ProtocolError};
pub use host::{BrowserHost, ExecutionError};
pub use protocol::{Command, Envelope, EnvelopeKind, Response, SessionCreated};
pub use router::{CommandRouter, Stores};
pub use tracker::{PendingRequest, RequestTracker, DEFAULT_REQUEST_TTL_SECS};

// Re-export the building blocks
pub use tether_permissions::{
    Action, ApprovalUi, PendingApproval, PermissionDecision, PermissionNegotiator,
    PermissionPolicy, PermissionPolicyStore, PermissionRequest, PollingApprovalUi, UserDecision,
};
pub use tether_security::{
    InboundMessage, OriginAuthenticator, ReplayGuard, SessionTokenStore, TrustedOrigin,
};
pub use tether_session::{Session, SessionRegistry, TabId};
pub use tether_storage::Database;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
