//! Session Registry
//!
//! Creates and looks up sessions, and owns the tab-isolation boundary:
//! a tab is owned by exactly the session that registered it, and every
//! other (session, tab) pair is denied.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use tether_security::TrustedOrigin;

use crate::error::SessionError;
use crate::session::{Session, TabId};
use crate::Result;

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, Session>,
    /// tab -> owning session
    tab_owners: HashMap<TabId, String>,
}

pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Create a new session for an authenticated caller
    pub fn create_session(&self, origin: &TrustedOrigin) -> Result<Session> {
        if !origin.is_secure() {
            tracing::warn!(origin = %origin, "Refused session for insecure origin");
            return Err(SessionError::InsecureOrigin(origin.to_string()));
        }

        let session = Session::new(origin.as_str().to_string());
        self.state
            .write()
            .sessions
            .insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            origin = %session.caller_origin,
            "Created session"
        );

        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.state.read().sessions.get(session_id).cloned()
    }

    pub fn require(&self, session_id: &str) -> Result<Session> {
        self.get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Register a tab as belonging to a session.
    ///
    /// Re-adding a tab to its own session is a no-op; adding a tab another
    /// session already owns fails.
    pub fn add_tab(&self, session_id: &str, tab_id: TabId) -> Result<()> {
        let mut state = self.state.write();

        if !state.sessions.contains_key(session_id) {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        match state.tab_owners.get(&tab_id) {
            Some(owner) if owner != session_id => {
                tracing::warn!(
                    session_id = %session_id,
                    tab_id,
                    "Refused to register tab owned by another session"
                );
                return Err(SessionError::TabAlreadyOwned { tab_id });
            }
            Some(_) => return Ok(()),
            None => {}
        }

        state.tab_owners.insert(tab_id, session_id.to_string());
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.add_tab(tab_id);
        }

        tracing::debug!(session_id = %session_id, tab_id, "Registered tab with session");

        Ok(())
    }

    /// False for any tab not registered by this exact session
    pub fn is_tab_owned(&self, session_id: &str, tab_id: TabId) -> bool {
        let state = self.state.read();

        let owner_matches = state
            .tab_owners
            .get(&tab_id)
            .is_some_and(|owner| owner == session_id);

        owner_matches
            && state
                .sessions
                .get(session_id)
                .is_some_and(|session| session.owns_tab(tab_id))
    }

    /// Tabs owned by a session, in ascending id order
    pub fn tabs(&self, session_id: &str) -> Result<Vec<TabId>> {
        Ok(self.require(session_id)?.tab_ids.into_iter().collect())
    }

    /// Auto-allow `origin` for the rest of this session's lifetime
    pub fn grant_origin_for_session(&self, session_id: &str, origin: &str) -> Result<()> {
        let mut state = self.state.write();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if session.grant_origin(origin.to_string()) {
            tracing::info!(
                session_id = %session_id,
                target_origin = %origin,
                "Granted target origin for session"
            );
        }

        Ok(())
    }

    pub fn is_origin_granted_for_session(&self, session_id: &str, origin: &str) -> bool {
        self.state
            .read()
            .sessions
            .get(session_id)
            .is_some_and(|session| session.has_granted_origin(origin))
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.state.read().sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every session and tab assignment (process restart)
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.sessions.clear();
        state.tab_owners.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_security::OriginAuthenticator;

    fn origin(raw: &str) -> TrustedOrigin {
        OriginAuthenticator::attest(raw).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(&origin("https://app.com")).unwrap();

        let fetched = registry.get(&session.id).unwrap();
        assert_eq!(fetched.caller_origin, "https://app.com");
        assert!(registry.get("missing").is_none());
        assert_eq!(
            registry.require("missing").unwrap_err(),
            SessionError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn test_insecure_origin_refused() {
        let registry = SessionRegistry::new();
        let result = registry.create_session(&origin("http://app.com"));
        assert!(matches!(result, Err(SessionError::InsecureOrigin(_))));
        assert!(registry.is_empty());

        assert!(registry
            .create_session(&origin("http://localhost:3000"))
            .is_ok());
    }

    #[test]
    fn test_tab_isolation() {
        let registry = SessionRegistry::new();
        let s1 = registry.create_session(&origin("https://app.com")).unwrap();
        let s2 = registry.create_session(&origin("https://app.com")).unwrap();

        for tab in [1, 2, 3] {
            registry.add_tab(&s1.id, tab).unwrap();
        }

        for tab in [1, 2, 3] {
            assert!(registry.is_tab_owned(&s1.id, tab));
            assert!(!registry.is_tab_owned(&s2.id, tab));
        }

        // Unknown tab and unknown session both fail closed
        assert!(!registry.is_tab_owned(&s1.id, 4));
        assert!(!registry.is_tab_owned("missing", 1));
        assert_eq!(registry.tabs(&s1.id).unwrap(), vec![1, 2, 3]);
        assert!(registry.tabs(&s2.id).unwrap().is_empty());
    }

    #[test]
    fn test_tab_cannot_change_owner() {
        let registry = SessionRegistry::new();
        let s1 = registry.create_session(&origin("https://app.com")).unwrap();
        let s2 = registry.create_session(&origin("https://other.com")).unwrap();

        registry.add_tab(&s1.id, 9).unwrap();
        registry.add_tab(&s1.id, 9).unwrap();

        assert_eq!(
            registry.add_tab(&s2.id, 9),
            Err(SessionError::TabAlreadyOwned { tab_id: 9 })
        );
        assert!(registry.is_tab_owned(&s1.id, 9));
        assert!(!registry.is_tab_owned(&s2.id, 9));
    }

    #[test]
    fn test_add_tab_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.add_tab("missing", 1),
            Err(SessionError::NotFound(_))
        ));
        assert!(!registry.is_tab_owned("missing", 1));
    }

    #[test]
    fn test_grants_are_session_scoped() {
        let registry = SessionRegistry::new();
        let s1 = registry.create_session(&origin("https://app.com")).unwrap();

        registry
            .grant_origin_for_session(&s1.id, "https://bank.com")
            .unwrap();
        assert!(registry.is_origin_granted_for_session(&s1.id, "https://bank.com"));

        // A fresh session from the same caller inherits nothing
        let s2 = registry.create_session(&origin("https://app.com")).unwrap();
        assert!(!registry.is_origin_granted_for_session(&s2.id, "https://bank.com"));

        assert!(registry
            .grant_origin_for_session("missing", "https://bank.com")
            .is_err());
    }

    #[test]
    fn test_reset_forgets_everything() {
        let registry = SessionRegistry::new();
        let session = registry.create_session(&origin("https://app.com")).unwrap();
        registry.add_tab(&session.id, 1).unwrap();

        registry.reset();

        assert!(registry.get(&session.id).is_none());
        assert!(!registry.is_tab_owned(&session.id, 1));
        assert_eq!(registry.len(), 0);
    }
}
