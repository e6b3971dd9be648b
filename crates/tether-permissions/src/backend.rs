//! Durable storage for remembered policies
//!
//! Sessions, tokens and nonces are process state. Policies are the only
//! thing written through a `PolicyBackend`, and the store works without
//! one (in-memory only).

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use tether_storage::{Database, StorageError};

use crate::action::Action;
use crate::policy::PermissionPolicy;
use crate::Result;

pub trait PolicyBackend: Send + Sync {
    fn load(&self) -> Result<Vec<PermissionPolicy>>;

    /// Insert or replace the policy for its (caller, target) pair
    fn save(&self, policy: &PermissionPolicy) -> Result<()>;

    fn delete(&self, caller_origin: &str, target_origin: &str) -> Result<()>;
}

pub struct SqlitePolicyBackend {
    db: Database,
}

impl SqlitePolicyBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl PolicyBackend for SqlitePolicyBackend {
    fn load(&self) -> Result<Vec<PermissionPolicy>> {
        let rows = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT caller_origin, target_origin, actions, created_at, updated_at
                 FROM permission_policies",
            )?;

            let rows: Vec<(String, String, String, String, String)> = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(rows)
        })?;

        let mut policies = Vec::with_capacity(rows.len());
        for (caller_origin, target_origin, actions_json, created_str, updated_str) in rows {
            let names: Vec<String> = serde_json::from_str(&actions_json)?;

            let mut allowed_actions = BTreeSet::new();
            for name in names {
                match name.parse::<Action>() {
                    Ok(action) => {
                        allowed_actions.insert(action);
                    }
                    Err(_) => {
                        tracing::warn!(
                            caller_origin = %caller_origin,
                            target_origin = %target_origin,
                            action = %name,
                            "Skipping unknown action in stored policy"
                        );
                    }
                }
            }

            policies.push(PermissionPolicy {
                caller_origin,
                target_origin,
                allowed_actions,
                created_at: parse_timestamp(&created_str)?,
                updated_at: parse_timestamp(&updated_str)?,
            });
        }

        Ok(policies)
    }

    fn save(&self, policy: &PermissionPolicy) -> Result<()> {
        let actions: Vec<&str> = policy.allowed_actions.iter().map(|a| a.as_str()).collect();
        let actions_json = serde_json::to_string(&actions)?;

        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO permission_policies
                 (caller_origin, target_origin, actions, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    policy.caller_origin,
                    policy.target_origin,
                    actions_json,
                    policy.created_at.to_rfc3339(),
                    policy.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(())
    }

    fn delete(&self, caller_origin: &str, target_origin: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "DELETE FROM permission_policies WHERE caller_origin = ?1 AND target_origin = ?2",
                [caller_origin, target_origin],
            )?;
            Ok(())
        })?;

        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::CorruptRow {
                table: "permission_policies",
                reason: format!("bad timestamp {value:?}: {e}"),
            }
            .into()
        })
}
