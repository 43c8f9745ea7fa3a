//! In-memory session registry
//!
//! Sessions are server-held so a client can resume one by id after a page
//! reload. Each session sits behind its own mutex; choices on one session
//! never wait on another.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{ResolverError, ResolverResult};
use crate::models::{DisambiguationSession, SessionId};

/// Shared handle to one session
pub type SessionHandle = Arc<Mutex<DisambiguationSession>>;

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: DisambiguationSession) -> SessionHandle {
        let id = session.session_id.clone();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: &SessionId) -> ResolverResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ResolverError::SessionNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Snapshot of current ids
    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
