//! The set of currently connected sessions.
//!
//! Only the connection handler mutates the registry: it registers on connect
//! and the returned guard removes the entry when the connection ends.

use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub connected_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionInfo>>,
}

impl SessionRegistry {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, SessionInfo>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a session. Returns `None` if the id is already connected.
    pub fn register(self: &Arc<Self>, session_id: &str) -> Option<SessionGuard> {
        let mut sessions = self.sessions();
        if sessions.contains_key(session_id) {
            return None;
        }
        sessions.insert(
            session_id.to_string(),
            SessionInfo {
                session_id: session_id.to_string(),
                connected_at: Utc::now(),
            },
        );
        debug!(session_id, active = sessions.len(), "Session registered");
        Some(SessionGuard {
            registry: Arc::clone(self),
            session_id: session_id.to_string(),
        })
    }

    pub fn lookup(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions();
        sessions.remove(session_id);
        debug!(session_id, active = sessions.len(), "Session removed");
    }
}

/// Keeps a session registered for as long as it lives.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session_id: String,
}

impl SessionGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.session_id);
    }
}
