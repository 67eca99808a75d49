//! Process-local session storage.
//!
//! Provides:
//! - `LocalFileBackend` - Durable one-record-per-session file store
//! - `MemoryBackend` - In-memory store for development and tests
//! - `ExpirationSweeper` - Background eviction of expired sessions

pub mod file;
pub mod memory;
pub mod sweeper;

pub use file::LocalFileBackend;
pub use memory::MemoryBackend;
pub use sweeper::ExpirationSweeper;
