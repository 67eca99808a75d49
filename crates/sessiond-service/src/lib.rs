//! Composite session service.
//!
//! Provides:
//! - `CompositeSessionService` - One session API routing across backends
//! - `SessionServiceConfig` - The configuration surface of the embedding
//!   layer, with a `build()` that wires backends and the sweeper

pub mod composite;
pub mod config;

pub use composite::{CompositeSessionService, SessionCreated};
pub use config::SessionServiceConfig;
