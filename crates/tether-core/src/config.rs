//! Router configuration

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tether_permissions::DEFAULT_APPROVAL_TIMEOUT;
use tether_security::{DEFAULT_NONCE_CAPACITY, DEFAULT_TOKEN_TTL_SECS};

use crate::error::CoreError;
use crate::tracker::DEFAULT_REQUEST_TTL_SECS;
use crate::Result;

/// Upper bound for every configured lifetime: one year
pub const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file for remembered policies; `None` keeps them in memory
    pub policy_database_path: Option<PathBuf>,
    /// How long a presented approval waits for the human
    pub approval_timeout_secs: u64,
    /// Session token lifetime
    pub token_ttl_secs: i64,
    /// Used nonces remembered before the oldest are evicted
    pub nonce_capacity: usize,
    /// In-flight request records older than this are pruned
    pub request_ttl_secs: i64,
}

impl Config {
    /// Configuration that remembers policies under the user data directory
    pub fn persistent() -> Self {
        Self {
            policy_database_path: Some(Self::data_dir().join("policies.db")),
            ..Self::default()
        }
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;

        tracing::debug!(path = %path.as_ref().display(), "Loaded configuration");

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.approval_timeout_secs == 0 {
            return Err(CoreError::Config("approval_timeout_secs must be positive".into()));
        }
        if self.approval_timeout_secs > MAX_TTL_SECS as u64 {
            return Err(CoreError::Config(format!(
                "approval_timeout_secs must be at most {MAX_TTL_SECS}"
            )));
        }
        check_ttl("token_ttl_secs", self.token_ttl_secs)?;
        check_ttl("request_ttl_secs", self.request_ttl_secs)?;
        if self.nonce_capacity == 0 {
            return Err(CoreError::Config("nonce_capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn token_ttl(&self) -> Result<TimeDelta> {
        ttl("token_ttl_secs", self.token_ttl_secs)
    }

    pub fn request_ttl(&self) -> Result<TimeDelta> {
        ttl("request_ttl_secs", self.request_ttl_secs)
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Tether"))
            .unwrap_or_else(|| PathBuf::from(".tether"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_database_path: None,
            approval_timeout_secs: DEFAULT_APPROVAL_TIMEOUT.as_secs(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            nonce_capacity: DEFAULT_NONCE_CAPACITY,
            request_ttl_secs: DEFAULT_REQUEST_TTL_SECS,
        }
    }
}

fn check_ttl(name: &str, secs: i64) -> Result<()> {
    if secs <= 0 || secs > MAX_TTL_SECS {
        return Err(CoreError::Config(format!(
            "{name} must be between 1 and {MAX_TTL_SECS}"
        )));
    }
    Ok(())
}

fn ttl(name: &str, secs: i64) -> Result<TimeDelta> {
    check_ttl(name, secs)?;
    TimeDelta::try_seconds(secs)
        .ok_or_else(|| CoreError::Config(format!("{name} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tether-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.approval_timeout(), Duration::from_secs(30));
        assert_eq!(config.token_ttl_secs, 86_400);
        assert_eq!(config.nonce_capacity, 10_000);
        assert_eq!(config.request_ttl_secs, 3_600);
        assert!(config.policy_database_path.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let path = temp_file(r#"{ "approval_timeout_secs": 5, "policy_database_path": "/tmp/p.db" }"#);
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.approval_timeout_secs, 5);
        assert_eq!(config.policy_database_path, Some(PathBuf::from("/tmp/p.db")));
        assert_eq!(config.nonce_capacity, DEFAULT_NONCE_CAPACITY);
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let path = temp_file(r#"{ "approval_timeout_secs": 0 }"#);
        let result = Config::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/definitely/not/here.json");
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn test_persistent_uses_data_dir() {
        let config = Config::persistent();
        let path = config.policy_database_path.unwrap();
        assert!(path.starts_with(Config::data_dir()));
    }

    #[test]
    fn test_oversized_ttls_rejected() {
        let config = Config {
            token_ttl_secs: 10_000_000_000_000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        assert!(matches!(config.token_ttl(), Err(CoreError::Config(_))));

        let config = Config {
            request_ttl_secs: i64::MAX,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        assert!(matches!(config.request_ttl(), Err(CoreError::Config(_))));

        let config = Config {
            approval_timeout_secs: u64::MAX,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let longest = Config {
            token_ttl_secs: MAX_TTL_SECS,
            ..Config::default()
        };
        assert!(longest.validate().is_ok());
        assert_eq!(longest.token_ttl().unwrap(), TimeDelta::days(365));
    }
}
