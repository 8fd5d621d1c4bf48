//! WebSocket message types.
//!
//! Every frame is a JSON envelope `{ "type": ..., "payload": ... }`.

use serde::{Deserialize, Serialize};

use crate::print_queue::PrintJob;

/// Server -> Client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Message type identifier (see [`msg_types`])
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Create a new server message with the given type and payload.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Create a server message with a null payload.
    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Full job list, sent on connect and after every queue change.
    pub fn queue_update(jobs: &[PrintJob]) -> Self {
        Self::new(msg_types::QUEUE_UPDATE, jobs)
    }
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub mod system {
    use serde::{Deserialize, Serialize};

    /// Sent immediately after connection is established.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Connected {
        pub agent_version: String,
    }

    /// Error message sent to client.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }
}

pub mod msg_types {
    pub const CONNECTED: &str = "connected";
    pub const QUEUE_UPDATE: &str = "queue_update";
    pub const ERROR: &str = "error";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    /// Client asks for the current job list.
    pub const REFRESH: &str = "refresh";
}
