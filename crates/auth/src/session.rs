//! Opaque session seam.
//!
//! The front controller only needs to turn a session id into a
//! [`Principal`]; how sessions are minted and stored is a separate concern
//! behind this trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use thiserror::Error;
use uuid::Uuid;

use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No session credential accompanied the request.
    #[error("missing session")]
    MissingSession,

    /// The presented session id does not map to a live session.
    #[error("invalid session: {0}")]
    InvalidSession(String),
}

/// Resolves opaque session ids to authenticated principals.
pub trait SessionManager: Send + Sync {
    fn principal(&self, session_id: &str) -> Result<Principal, AuthError>;
}

impl<S> SessionManager for Arc<S>
where
    S: SessionManager + ?Sized,
{
    fn principal(&self, session_id: &str) -> Result<Principal, AuthError> {
        (**self).principal(session_id)
    }
}

/// Process-local session table for tests and dev mode.
#[derive(Debug, Default)]
pub struct InMemorySessions {
    sessions: RwLock<HashMap<String, Principal>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal and return the freshly minted session id.
    pub fn open(&self, principal: Principal) -> String {
        let session_id = Uuid::now_v7().to_string();
        self.sessions
            .write()
            .expect("session table poisoned")
            .insert(session_id.clone(), principal);
        session_id
    }

    /// Register a principal under a caller-chosen session id (dev wiring,
    /// tests that need a predictable cookie).
    pub fn open_with_id(&self, session_id: impl Into<String>, principal: Principal) {
        self.sessions
            .write()
            .expect("session table poisoned")
            .insert(session_id.into(), principal);
    }

    pub fn close(&self, session_id: &str) {
        self.sessions
            .write()
            .expect("session table poisoned")
            .remove(session_id);
    }
}

impl SessionManager for InMemorySessions {
    fn principal(&self, session_id: &str) -> Result<Principal, AuthError> {
        self.sessions
            .read()
            .expect("session table poisoned")
            .get(session_id)
            .cloned()
            .ok_or_else(|| AuthError::InvalidSession(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use col_core::UserId;

    fn principal() -> Principal {
        Principal::new(UserId::new(7), "gverdi", Role::new("user"), vec![])
    }

    #[test]
    fn open_then_resolve() {
        let sessions = InMemorySessions::new();
        let sid = sessions.open(principal());
        let resolved = sessions.principal(&sid).unwrap();
        assert_eq!(resolved.username(), "gverdi");
    }

    #[test]
    fn closed_sessions_stop_resolving() {
        let sessions = InMemorySessions::new();
        let sid = sessions.open(principal());
        sessions.close(&sid);
        assert!(matches!(
            sessions.principal(&sid),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn unknown_id_is_invalid() {
        let sessions = InMemorySessions::new();
        assert!(sessions.principal("nope").is_err());
    }
}
