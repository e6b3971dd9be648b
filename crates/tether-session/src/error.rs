//! Session error types

use thiserror::Error;

use crate::session::TabId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Insecure origin cannot open a session: {0}")]
    InsecureOrigin(String),

    #[error("Tab {tab_id} already belongs to another session")]
    TabAlreadyOwned { tab_id: TabId },
}
