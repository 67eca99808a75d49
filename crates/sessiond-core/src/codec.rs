//! Byte encoding for sessions, shared by disk records and the wire.

use crate::{Session, backend::SessionError};

/// Encode a session to its byte representation.
///
/// # Errors
/// Returns `CorruptPayload` if the session cannot be serialized.
pub fn encode(session: &Session) -> Result<Vec<u8>, SessionError> {
    serde_json::to_vec(session).map_err(|e| SessionError::CorruptPayload(e.to_string()))
}

/// Decode a session from its byte representation.
///
/// Truncated or corrupted input fails with `CorruptPayload`; a partially
/// populated session is never returned.
///
/// # Errors
/// Returns `CorruptPayload` if the bytes are not a well-formed record.
pub fn decode(bytes: &[u8]) -> Result<Session, SessionError> {
    serde_json::from_slice(bytes).map_err(|e| SessionError::CorruptPayload(e.to_string()))
}
