//! Storage backend trait and error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::Session;

/// Where a backend keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    /// Process-local storage (files, memory).
    Local,
    /// A remote session server reached over RPC.
    Remote,
}

/// Session storage failure.
///
/// A lookup miss is not a failure: `SessionBackend::get` reports it as
/// `Ok(None)`. Backends translate raw transport and filesystem errors into
/// these variants at their boundary; nothing rawer escapes to callers.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A stored or transmitted record could not be decoded.
    #[error("corrupt session payload: {0}")]
    CorruptPayload(String),

    /// Local I/O failed while persisting or deleting a record.
    #[error("session persistence failed: {0}")]
    PersistenceFailure(#[from] std::io::Error),

    /// A configured session server address is malformed.
    #[error("invalid session server address: {0}")]
    InvalidAddress(String),

    /// The remote session server could not be reached or answered with an error.
    #[error("remote session server unavailable: {0}")]
    RemoteUnavailable(String),

    /// A remote operation exceeded its deadline.
    #[error("remote session operation timed out")]
    RemoteTimeout,
}

/// Trait implemented by session storage backends.
///
/// Implementations must be safe under concurrent access; the composite
/// service calls them from many request-handling tasks at once.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Which kind of storage this backend is.
    fn role(&self) -> BackendRole;

    /// Look up a session by id. Expired sessions are reported as a miss.
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Idempotent upsert; overwrites any existing record for the same id.
    async fn put(&self, session: &Session) -> Result<(), SessionError>;

    /// Delete the record if present. Removing an absent id is a no-op.
    async fn remove(&self, id: &str) -> Result<(), SessionError>;
}
