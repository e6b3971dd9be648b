//! Pending approvals and the approval-UI contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::request::PermissionRequest;
use crate::Result;

/// A permission request waiting for the human
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    pub id: String,
    pub request: PermissionRequest,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl PendingApproval {
    pub fn new(request: PermissionRequest, session_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            session_id,
            created_at: Utc::now(),
        }
    }
}

/// What the human answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecision {
    pub allow: bool,
    /// Also create a persistent policy (only meaningful with `allow`)
    pub remember: bool,
}

impl UserDecision {
    pub fn allow() -> Self {
        Self {
            allow: true,
            remember: false,
        }
    }

    pub fn allow_and_remember() -> Self {
        Self {
            allow: true,
            remember: true,
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            remember: false,
        }
    }
}

/// Decision message sent back by an approval UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDecision {
    pub permission_id: String,
    pub allow: bool,
    #[serde(default)]
    pub remember: bool,
    pub session_id: String,
}

impl From<&PermissionDecision> for UserDecision {
    fn from(decision: &PermissionDecision) -> Self {
        Self {
            allow: decision.allow,
            remember: decision.allow && decision.remember,
        }
    }
}

/// The interactive approval surface.
///
/// `present` may take arbitrarily long, fail, or never finish; the
/// negotiator bounds it with its own timeout and treats failure as denial.
#[async_trait]
pub trait ApprovalUi: Send + Sync {
    async fn present(&self, approval: PendingApproval) -> Result<UserDecision>;

    /// The negotiator gave up on this approval; stop showing it
    fn withdraw(&self, _approval_id: &str) {}
}

/// Every approval not yet resolved, oldest first
pub struct ApprovalQueue {
    entries: Arc<Mutex<VecDeque<PendingApproval>>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn push(&self, approval: PendingApproval) {
        self.entries.lock().push_back(approval);
    }

    pub fn remove(&self, approval_id: &str) -> Option<PendingApproval> {
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|a| a.id == approval_id)?;
        entries.remove(index)
    }

    pub fn front(&self) -> Option<PendingApproval> {
        self.entries.lock().front().cloned()
    }

    pub fn list(&self) -> Vec<PendingApproval> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.entries.lock().clear();
    }
}

impl Default for ApprovalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ApprovalQueue {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;

    fn approval(target: &str) -> PendingApproval {
        PendingApproval::new(
            PermissionRequest::new(Action::Navigate, "https://app.com", target),
            "session-1".to_string(),
        )
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = ApprovalQueue::new();
        let a = approval("https://a.com");
        let b = approval("https://b.com");
        queue.push(a.clone());
        queue.push(b.clone());

        assert_eq!(queue.front().unwrap().id, a.id);
        assert_eq!(queue.remove(&a.id).unwrap().id, a.id);
        assert_eq!(queue.front().unwrap().id, b.id);
        assert!(queue.remove(&a.id).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_from_middle() {
        let queue = ApprovalQueue::new();
        let ids: Vec<String> = ["https://a.com", "https://b.com", "https://c.com"]
            .into_iter()
            .map(|t| {
                let a = approval(t);
                queue.push(a.clone());
                a.id
            })
            .collect();

        queue.remove(&ids[1]);
        let remaining: Vec<String> = queue.list().into_iter().map(|a| a.id).collect();
        assert_eq!(remaining, vec![ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_remember_requires_allow() {
        let decision = PermissionDecision {
            permission_id: "p".to_string(),
            allow: false,
            remember: true,
            session_id: "s".to_string(),
        };
        assert_eq!(UserDecision::from(&decision), UserDecision::deny());

        let parsed: PermissionDecision = serde_json::from_str(
            r#"{"permissionId":"p","allow":true,"sessionId":"s"}"#,
        )
        .unwrap();
        assert_eq!(UserDecision::from(&parsed), UserDecision::allow());
    }
}
