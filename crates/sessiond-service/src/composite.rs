//! One session API routing across configured backends.

use std::sync::Arc;

use futures::future::join_all;
use sessiond_core::{Session, SessionBackend, SessionError, now_ms};
use sessiond_local::ExpirationSweeper;
use uuid::Uuid;

/// Outcome of a session creation.
///
/// The session exists as soon as one backend took the write; failures of
/// the remaining backends are reported here as non-fatal warnings.
#[derive(Debug)]
pub struct SessionCreated {
    pub session: Session,
    pub warnings: Vec<SessionError>,
}

/// Façade over an ordered list of session backends.
///
/// Reads take the first hit in priority order (lower index wins) and fill
/// higher-priority backends on a fallback hit; writes fan out to every
/// backend best-effort. The backend list is fixed at construction, so the
/// service can be shared by reference across request handlers without
/// further locking.
pub struct CompositeSessionService {
    backends: Vec<Arc<dyn SessionBackend>>,
    default_timeout_secs: i64,
    sweeper: Option<ExpirationSweeper>,
}

impl std::fmt::Debug for CompositeSessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSessionService")
            .field("backends", &self.backends.len())
            .field("default_timeout_secs", &self.default_timeout_secs)
            .field("sweeper", &self.sweeper.is_some())
            .finish()
    }
}

impl CompositeSessionService {
    /// Create a service with no backends yet.
    #[must_use]
    pub fn new(default_timeout_secs: i64) -> Self {
        Self {
            backends: Vec::new(),
            default_timeout_secs,
            sweeper: None,
        }
    }

    /// Append a backend; earlier backends have read priority.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn SessionBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Attach the sweeper handle so `shutdown` stops it.
    #[must_use]
    pub fn with_sweeper(mut self, sweeper: ExpirationSweeper) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    /// The configured backends, in read-priority order.
    #[must_use]
    pub fn backends(&self) -> &[Arc<dyn SessionBackend>] {
        &self.backends
    }

    /// Default inactivity timeout for new sessions, in seconds.
    #[must_use]
    pub fn default_timeout_secs(&self) -> i64 {
        self.default_timeout_secs
    }

    /// Look up a session, querying backends in priority order.
    ///
    /// A hit refreshes the access time. A hit on a lower-priority backend
    /// is written through to every higher-priority backend so the next
    /// read is served locally. Degraded backends are logged and skipped.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.get(id).await {
                Ok(Some(mut session)) => {
                    session.touch(now_ms());
                    self.fill_ahead_of(&session, index).await;
                    return Some(session);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, role = ?backend.role(), error = %e, "session backend read failed");
                }
            }
        }
        None
    }

    async fn fill_ahead_of(&self, session: &Session, hit_index: usize) {
        for backend in &self.backends[..hit_index] {
            if let Err(e) = backend.put(session).await {
                tracing::warn!(id = %session.id, role = ?backend.role(), error = %e, "session write-through failed");
            }
        }
    }

    /// Create a session with the default timeout.
    ///
    /// # Errors
    /// See [`create_session`](Self::create_session).
    pub async fn create_session_default(&self) -> Result<SessionCreated, SessionError> {
        self.create_session(self.default_timeout_secs).await
    }

    /// Create a session and replicate it to every backend concurrently.
    ///
    /// Best-effort: the session is created as long as one backend (or
    /// none being configured) took the write; individual failures come
    /// back as warnings.
    ///
    /// # Errors
    /// Fails only when every configured backend rejected the write.
    pub async fn create_session(&self, timeout_secs: i64) -> Result<SessionCreated, SessionError> {
        let session = Session::new(Uuid::new_v4().simple().to_string(), timeout_secs);

        let results = join_all(self.backends.iter().map(|b| b.put(&session))).await;

        let mut warnings = Vec::new();
        let mut stored = 0usize;
        for (backend, result) in self.backends.iter().zip(results) {
            match result {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::warn!(id = %session.id, role = ?backend.role(), error = %e, "session create failed on backend");
                    warnings.push(e);
                }
            }
        }

        if stored == 0 && !self.backends.is_empty() {
            if let Some(err) = warnings.pop() {
                return Err(err);
            }
        }

        tracing::debug!(id = %session.id, stored, "session created");
        Ok(SessionCreated { session, warnings })
    }

    /// Write a dirty session back to every backend concurrently.
    ///
    /// Clean sessions are a no-op. A remote failure does not roll back the
    /// local write; failures are returned as warnings. The session is
    /// marked clean once any backend (or none being configured) holds it.
    pub async fn save_session(&self, session: &mut Session) -> Vec<SessionError> {
        if !session.is_dirty() {
            return Vec::new();
        }

        let results = join_all(self.backends.iter().map(|b| b.put(&*session))).await;

        let mut warnings = Vec::new();
        let mut stored = 0usize;
        for (backend, result) in self.backends.iter().zip(results) {
            match result {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::warn!(id = %session.id, role = ?backend.role(), error = %e, "session save failed on backend");
                    warnings.push(e);
                }
            }
        }

        if stored > 0 || self.backends.is_empty() {
            session.mark_clean();
        }
        warnings
    }

    /// Remove a session from every backend. Absent-in-one is not an error.
    pub async fn remove_session(&self, id: &str) -> Vec<SessionError> {
        let results = join_all(self.backends.iter().map(|b| b.remove(id))).await;

        let mut warnings = Vec::new();
        for (backend, result) in self.backends.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(id, role = ?backend.role(), error = %e, "session remove failed on backend");
                warnings.push(e);
            }
        }
        warnings
    }

    /// Stop background work (the expiration sweeper).
    pub fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.shutdown();
        }
    }
}
