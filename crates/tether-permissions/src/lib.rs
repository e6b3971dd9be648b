//! Tether Permissions
//!
//! Two tiers decide whether a caller may act on a target origin:
//! - Session grants: approved once, auto-allowed until the session ends
//! - Policies: created only by an explicit "remember", survive restarts
//!
//! Anything neither tier covers is queued for the human, one request at a
//! time in arrival order, and is denied if no answer comes within 30 seconds.

mod action;
mod approval;
mod backend;
mod error;
mod negotiator;
mod policy;
mod polling;
mod request;

pub use action::Action;
pub use approval::{ApprovalQueue, ApprovalUi, PendingApproval, PermissionDecision, UserDecision};
pub use backend::{PolicyBackend, SqlitePolicyBackend};
pub use error::PermissionError;
pub use negotiator::{PermissionNegotiator, Resolution, DEFAULT_APPROVAL_TIMEOUT};
pub use policy::{PermissionPolicy, PermissionPolicyStore};
pub use polling::PollingApprovalUi;
pub use request::PermissionRequest;

pub type Result<T> = std::result::Result<T, PermissionError>;
