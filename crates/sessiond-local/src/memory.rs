//! In-memory session storage.

use std::collections::HashMap;

use async_trait::async_trait;
use sessiond_core::{BackendRole, Session, SessionBackend, SessionError, now_ms};
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// Useful for development, tests and as the store behind a session server.
/// Data is lost on restart.
pub struct MemoryBackend {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryBackend {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (possibly expired but not yet evicted) records.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    fn role(&self) -> BackendRole {
        BackendRole::Local
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(session) if session.is_expired(now_ms()) => true,
                Some(session) => return Ok(Some(session.clone())),
                None => return Ok(None),
            }
        };
        if expired {
            self.sessions.write().await.remove(id);
        }
        Ok(None)
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
