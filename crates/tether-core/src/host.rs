//! Browser host contract
//!
//! The router never touches a page itself. Opening tabs, reading a tab's
//! URL and running DOM tools are delegated to whatever embeds it, and that
//! collaborator's errors are passed back to the caller unchanged.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use tether_permissions::Action;
use tether_session::TabId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is not an input: {0}")]
    NotInputElement(String),

    #[error("Tab {0} is closed")]
    TabClosed(TabId),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Open a tab, optionally loading `url`, and return its id
    async fn create_tab(&self, url: Option<&str>) -> Result<TabId, ExecutionError>;

    /// Load `url` in an existing tab
    async fn navigate(&self, tab_id: TabId, url: &str) -> Result<Value, ExecutionError>;

    /// URL currently shown by a tab
    async fn tab_url(&self, tab_id: TabId) -> Result<String, ExecutionError>;

    /// Run a tab-scoped tool
    async fn execute(&self, tab_id: TabId, action: Action, args: &Value)
        -> Result<Value, ExecutionError>;
}
