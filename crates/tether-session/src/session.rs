//! Session data structure

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Browser tab identifier as reported by the host
pub type TabId = u32;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique identifier
    pub id: String,
    /// Trusted origin that created the session
    pub caller_origin: String,
    pub created_at: DateTime<Utc>,
    /// Tabs this session may operate on
    pub tab_ids: BTreeSet<TabId>,
    /// Target origins auto-allowed for the rest of this session
    pub granted_origins: BTreeSet<String>,
}

impl Session {
    pub fn new(caller_origin: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            caller_origin,
            created_at: Utc::now(),
            tab_ids: BTreeSet::new(),
            granted_origins: BTreeSet::new(),
        }
    }

    /// Returns false if the tab was already registered
    pub fn add_tab(&mut self, tab_id: TabId) -> bool {
        self.tab_ids.insert(tab_id)
    }

    pub fn owns_tab(&self, tab_id: TabId) -> bool {
        self.tab_ids.contains(&tab_id)
    }

    /// Grants only accumulate; there is no way to take one back mid-session
    pub fn grant_origin(&mut self, origin: String) -> bool {
        self.granted_origins.insert(origin)
    }

    pub fn has_granted_origin(&self, origin: &str) -> bool {
        self.granted_origins.contains(origin)
    }

    pub fn tab_count(&self) -> usize {
        self.tab_ids.len()
    }
}
