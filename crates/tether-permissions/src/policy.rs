//! Persistent permission policies
//!
//! A policy allows one caller origin to perform a set of actions against
//! one target origin, across sessions and restarts. Matching is by exact
//! origin string; there are no wildcards or prefixes.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::action::Action;
use crate::backend::PolicyBackend;
use crate::request::PermissionRequest;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionPolicy {
    pub caller_origin: String,
    pub target_origin: String,
    pub allowed_actions: BTreeSet<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionPolicy {
    pub fn new(caller_origin: String, target_origin: String) -> Self {
        let now = Utc::now();

        Self {
            caller_origin,
            target_origin,
            allowed_actions: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.allowed_actions.contains(&action)
    }

    fn key(&self) -> PolicyKey {
        (self.caller_origin.clone(), self.target_origin.clone())
    }
}

/// (caller origin, target origin)
type PolicyKey = (String, String);

pub struct PermissionPolicyStore {
    policies: Arc<RwLock<HashMap<PolicyKey, PermissionPolicy>>>,
    backend: Option<Arc<dyn PolicyBackend>>,
}

impl PermissionPolicyStore {
    /// Policies held in memory only; they vanish with the process
    pub fn in_memory() -> Self {
        Self {
            policies: Arc::new(RwLock::new(HashMap::new())),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn PolicyBackend>) -> Self {
        Self {
            policies: Arc::new(RwLock::new(HashMap::new())),
            backend: Some(backend),
        }
    }

    /// Load remembered policies from the durable backend
    pub fn init(&self) -> Result<usize> {
        let backend = match &self.backend {
            Some(b) => b,
            None => return Ok(0),
        };

        let loaded = backend.load()?;
        let count = loaded.len();

        let mut policies = self.policies.write();
        policies.clear();
        for policy in loaded {
            policies.insert(policy.key(), policy);
        }

        tracing::info!(count, "Loaded permission policies");

        Ok(count)
    }

    /// Add `request.action` to the policy for its (caller, target) pair.
    ///
    /// With `persist` the updated policy is written to the backend first; if
    /// that write fails nothing changes in memory either.
    pub fn grant(&self, request: &PermissionRequest, persist: bool) -> Result<PermissionPolicy> {
        let key = (request.caller_origin.clone(), request.target_origin.clone());
        let mut policies = self.policies.write();

        let mut policy = policies.get(&key).cloned().unwrap_or_else(|| {
            PermissionPolicy::new(
                request.caller_origin.clone(),
                request.target_origin.clone(),
            )
        });
        policy.allowed_actions.insert(request.action);
        policy.updated_at = Utc::now();

        if persist {
            if let Some(backend) = &self.backend {
                backend.save(&policy)?;
            }
        }

        policies.insert(key, policy.clone());
        drop(policies);

        tracing::info!(
            caller_origin = %policy.caller_origin,
            target_origin = %policy.target_origin,
            action = %request.action,
            persist,
            "Remembered permission policy"
        );

        Ok(policy)
    }

    /// True iff a policy exists for the exact pair and lists the action
    pub fn is_allowed(&self, request: &PermissionRequest) -> bool {
        self.policies
            .read()
            .get(&(request.caller_origin.clone(), request.target_origin.clone()))
            .is_some_and(|policy| policy.allows(request.action))
    }

    /// Remove the policy for a pair; returns whether one existed
    pub fn revoke(&self, caller_origin: &str, target_origin: &str) -> Result<bool> {
        if let Some(backend) = &self.backend {
            backend.delete(caller_origin, target_origin)?;
        }

        let removed = self
            .policies
            .write()
            .remove(&(caller_origin.to_string(), target_origin.to_string()))
            .is_some();

        if removed {
            tracing::info!(
                caller_origin = %caller_origin,
                target_origin = %target_origin,
                "Revoked permission policy"
            );
        }

        Ok(removed)
    }

    /// All policies a caller origin holds, ordered by target origin
    pub fn policies_for(&self, caller_origin: &str) -> Vec<PermissionPolicy> {
        let mut out: Vec<PermissionPolicy> = self
            .policies
            .read()
            .values()
            .filter(|p| p.caller_origin == caller_origin)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.target_origin.cmp(&b.target_origin));
        out
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the in-memory view; durable rows stay and come back on `init`
    pub fn reset(&self) {
        self.policies.write().clear();
    }
}

impl Default for PermissionPolicyStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Clone for PermissionPolicyStore {
    fn clone(&self) -> Self {
        Self {
            policies: Arc::clone(&self.policies),
            backend: self.backend.clone(),
        }
    }
}
