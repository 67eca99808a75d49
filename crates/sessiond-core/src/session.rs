//! The session entity.

use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Per-client server-side session state.
///
/// The id is generated on creation and immutable thereafter. Attribute
/// values are arbitrary JSON so applications can store whatever they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier.
    pub id: String,

    /// Named attributes, unique keys.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,

    /// Creation timestamp (epoch milliseconds).
    pub creation_time: i64,

    /// Last access timestamp (epoch milliseconds).
    pub last_accessed_time: i64,

    /// Expiry window in seconds; `<= 0` means the session never expires.
    pub max_inactive_interval: i64,

    /// Whether attributes changed since the session was last persisted.
    #[serde(default)]
    pub dirty: bool,
}

impl Session {
    /// Create a new session with the given id and timeout.
    #[must_use]
    pub fn new(id: impl Into<String>, max_inactive_interval: i64) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            attributes: HashMap::new(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval,
            dirty: false,
        }
    }

    /// Whether the session has outlived its inactivity window.
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.max_inactive_interval > 0
            && now_ms - self.last_accessed_time > self.max_inactive_interval * 1000
    }

    /// Record an access, pushing the expiry window forward.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_accessed_time = now_ms;
    }

    /// Get an attribute value.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute value, marking the session dirty.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
        self.dirty = true;
    }

    /// Remove an attribute. Removing an absent key leaves the session clean.
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        let removed = self.attributes.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Whether the session needs a write-back.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after a successful write-back.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
