//! Wire protocol for session server communication.

use serde::{Deserialize, Serialize};

/// Operation requested of the session server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Get,
    Create,
    Put,
    Remove,
}

/// Request from client to session server.
///
/// The correlation id lets responses be matched out of order on a
/// multiplexed connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub correlation_id: u64,
    pub op: Op,
    pub session_id: String,
    /// Codec-encoded session for `Create`/`Put`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

/// Response outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    NotFound,
    Error,
}

/// Response from session server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub correlation_id: u64,
    pub status: Status,
    /// Codec-encoded session for a `Get` hit, or an error message for
    /// `Status::Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Successful response, optionally carrying a session payload.
    #[must_use]
    pub fn ok(correlation_id: u64, payload: Option<Vec<u8>>) -> Self {
        Self {
            correlation_id,
            status: Status::Ok,
            payload,
        }
    }

    /// Lookup miss.
    #[must_use]
    pub fn not_found(correlation_id: u64) -> Self {
        Self {
            correlation_id,
            status: Status::NotFound,
            payload: None,
        }
    }

    /// Server-side failure, message carried in the payload.
    #[must_use]
    pub fn failure(correlation_id: u64, message: &str) -> Self {
        Self {
            correlation_id,
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// The error message of a `Status::Error` response.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.payload
            .as_deref()
            .map_or_else(|| "unknown error".to_string(), |bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let request = Request {
            correlation_id: 7,
            op: Op::Put,
            session_id: "s1".to_string(),
            payload: Some(vec![1, 2, 3]),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("put"));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.correlation_id, 7);
        assert_eq!(parsed.op, Op::Put);
        assert_eq!(parsed.payload.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn absent_payload_is_omitted() {
        let response = Response::not_found(3);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("payload"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, Status::NotFound);
        assert!(parsed.payload.is_none());
    }

    #[test]
    fn failure_carries_its_message() {
        let response = Response::failure(9, "disk full");
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.error_message(), "disk full");
    }
}
