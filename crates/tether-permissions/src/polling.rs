//! Approval UI adapter for a UI that polls
//!
//! The UI asks for "the" pending request, shows it, and answers with a
//! [`PermissionDecision`] message. The negotiator only ever presents one
//! approval at a time, so a single slot is enough.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::approval::{ApprovalUi, PendingApproval, PermissionDecision, UserDecision};
use crate::error::PermissionError;
use crate::Result;

struct Presented {
    approval: PendingApproval,
    reply: oneshot::Sender<UserDecision>,
}

pub struct PollingApprovalUi {
    current: Arc<Mutex<Option<Presented>>>,
}

impl PollingApprovalUi {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// The approval the UI should be showing right now
    pub fn pending(&self) -> Option<PendingApproval> {
        self.current.lock().as_ref().map(|p| p.approval.clone())
    }

    /// Deliver the human's answer for the presented approval
    pub fn decide(&self, decision: PermissionDecision) -> Result<()> {
        let mut current = self.current.lock();

        match current.as_ref() {
            Some(p) if p.approval.id != decision.permission_id => {
                return Err(PermissionError::UnknownApproval(decision.permission_id));
            }
            Some(p) if p.approval.session_id != decision.session_id => {
                tracing::warn!(
                    approval_id = %decision.permission_id,
                    expected = %p.approval.session_id,
                    got = %decision.session_id,
                    "Permission decision names the wrong session"
                );
                return Err(PermissionError::SessionMismatch(decision.permission_id));
            }
            Some(_) => {}
            None => return Err(PermissionError::UnknownApproval(decision.permission_id)),
        }

        let presented = match current.take() {
            Some(p) => p,
            None => return Err(PermissionError::UnknownApproval(decision.permission_id)),
        };

        presented
            .reply
            .send(UserDecision::from(&decision))
            .map_err(|_| PermissionError::UnknownApproval(decision.permission_id))
    }
}

impl Default for PollingApprovalUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalUi for PollingApprovalUi {
    async fn present(&self, approval: PendingApproval) -> Result<UserDecision> {
        let (reply, answer) = oneshot::channel();
        {
            let mut current = self.current.lock();
            *current = Some(Presented { approval, reply });
        }

        answer.await.map_err(|_| {
            PermissionError::ApprovalUnavailable("approval slot was replaced".to_string())
        })
    }

    fn withdraw(&self, approval_id: &str) {
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|p| p.approval.id == approval_id)
        {
            *current = None;
        }
    }
}
