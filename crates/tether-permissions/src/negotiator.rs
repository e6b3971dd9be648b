//! Permission negotiation
//!
//! ```text
//! CHECK_SESSION ──granted──▶ RESOLVED(allow)
//!      │
//! CHECK_POLICY ──allowed──▶ RESOLVED(allow)
//!      │
//! AWAIT_UI ──allow──▶ RESOLVED(allow)   (+ session grant, + policy if remembered)
//!      ├──deny───▶ RESOLVED(deny)
//!      └──30 s───▶ RESOLVED(deny, timeout)
//! ```
//!
//! Requests that reach AWAIT_UI wait in a FIFO queue and are presented one
//! at a time. The timeout starts when a request is presented, not when it
//! is queued, so nothing behind a slow answer is silently dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

use tether_session::SessionRegistry;

use crate::approval::{ApprovalQueue, ApprovalUi, PendingApproval, UserDecision};
use crate::error::PermissionError;
use crate::policy::PermissionPolicyStore;
use crate::request::PermissionRequest;
use crate::Result;

pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a request was allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    SessionGrant,
    Policy,
    UserApproved { remember: bool },
}

pub struct PermissionNegotiator {
    sessions: SessionRegistry,
    policies: PermissionPolicyStore,
    ui: Arc<dyn ApprovalUi>,
    queue: ApprovalQueue,
    /// Held while an approval is on screen; tokio's mutex wakes waiters in order
    presenting: Arc<AsyncMutex<()>>,
    timeout: Duration,
}

impl PermissionNegotiator {
    pub fn new(
        sessions: SessionRegistry,
        policies: PermissionPolicyStore,
        ui: Arc<dyn ApprovalUi>,
    ) -> Self {
        Self {
            sessions,
            policies,
            ui,
            queue: ApprovalQueue::new(),
            presenting: Arc::new(AsyncMutex::new(())),
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The two automatic tiers, without touching the UI
    pub fn auto_decision(&self, request: &PermissionRequest, session_id: &str) -> Option<Resolution> {
        if self
            .sessions
            .is_origin_granted_for_session(session_id, &request.target_origin)
        {
            return Some(Resolution::SessionGrant);
        }

        if self.policies.is_allowed(request) {
            return Some(Resolution::Policy);
        }

        None
    }

    /// Decide a request, asking the human if neither tier allows it
    pub async fn negotiate(
        &self,
        request: PermissionRequest,
        session_id: &str,
    ) -> Result<Resolution> {
        if let Some(resolution) = self.auto_decision(&request, session_id) {
            tracing::debug!(
                session_id = %session_id,
                action = %request.action,
                target_origin = %request.target_origin,
                ?resolution,
                "Permission auto-allowed"
            );
            return Ok(resolution);
        }

        let approval = PendingApproval::new(request, session_id.to_string());
        let _entry = QueuedApproval::enqueue(&self.queue, approval.clone());

        self.await_decision(approval).await
    }

    async fn await_decision(&self, approval: PendingApproval) -> Result<Resolution> {
        let _turn = self.presenting.lock().await;

        // An approval answered while this one waited may already cover it
        if let Some(resolution) = self.auto_decision(&approval.request, &approval.session_id) {
            return Ok(resolution);
        }

        tracing::info!(
            approval_id = %approval.id,
            session_id = %approval.session_id,
            action = %approval.request.action,
            target_origin = %approval.request.target_origin,
            "Awaiting user approval"
        );

        let presented = tokio::time::timeout(self.timeout, self.ui.present(approval.clone())).await;

        match presented {
            Ok(Ok(decision)) => self.apply(&approval, decision),
            Ok(Err(e)) => {
                tracing::warn!(
                    approval_id = %approval.id,
                    error = %e,
                    "Approval UI failed; treating as denial"
                );
                Err(denied(&approval))
            }
            Err(_) => {
                self.ui.withdraw(&approval.id);
                tracing::warn!(
                    approval_id = %approval.id,
                    session_id = %approval.session_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Approval timed out"
                );
                Err(PermissionError::Timeout {
                    action: approval.request.action,
                    target_origin: approval.request.target_origin.clone(),
                })
            }
        }
    }

    fn apply(&self, approval: &PendingApproval, decision: UserDecision) -> Result<Resolution> {
        if !decision.allow {
            tracing::info!(
                approval_id = %approval.id,
                session_id = %approval.session_id,
                "User denied permission"
            );
            return Err(denied(approval));
        }

        self.sessions
            .grant_origin_for_session(&approval.session_id, &approval.request.target_origin)?;

        if decision.remember {
            if let Err(e) = self.policies.grant(&approval.request, true) {
                tracing::error!(
                    approval_id = %approval.id,
                    error = %e,
                    "Failed to remember permission policy"
                );
            }
        }

        tracing::info!(
            approval_id = %approval.id,
            session_id = %approval.session_id,
            remember = decision.remember,
            "User approved permission"
        );

        Ok(Resolution::UserApproved {
            remember: decision.remember,
        })
    }

    /// Every unresolved approval, oldest first
    pub fn pending(&self) -> Vec<PendingApproval> {
        self.queue.list()
    }

    /// The approval that is (or is next to be) in front of the human
    pub fn current(&self) -> Option<PendingApproval> {
        self.queue.front()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forget queued approvals (process restart)
    pub fn reset(&self) {
        self.queue.reset();
    }
}

impl Clone for PermissionNegotiator {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            policies: self.policies.clone(),
            ui: Arc::clone(&self.ui),
            queue: self.queue.clone(),
            presenting: Arc::clone(&self.presenting),
            timeout: self.timeout,
        }
    }
}

fn denied(approval: &PendingApproval) -> PermissionError {
    PermissionError::Denied {
        action: approval.request.action,
        target_origin: approval.request.target_origin.clone(),
    }
}

/// Keeps an approval visible in the queue until its negotiation ends,
/// including when the negotiating future is dropped.
struct QueuedApproval<'a> {
    queue: &'a ApprovalQueue,
    id: String,
}

impl<'a> QueuedApproval<'a> {
    fn enqueue(queue: &'a ApprovalQueue, approval: PendingApproval) -> Self {
        let id = approval.id.clone();
        queue.push(approval);
        Self { queue, id }
    }
}

impl Drop for QueuedApproval<'_> {
    fn drop(&mut self) {
        self.queue.remove(&self.id);
    }
}
