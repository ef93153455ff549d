//! Stream events.
//!
//! All socket activity is reported through a single [`EventHandler`] so the
//! consumer handles every case in one exhaustive match.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Event emitted by a [`crate::StreamClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Socket handshake completed.
    Opened,
    /// Incoming payload.
    Message(StreamPayload),
    /// Transport error. Always followed by `Closed`.
    Error(String),
    /// Socket closed. `reconnecting` is false once the client has given up.
    Closed { reconnecting: bool },
}

/// Incoming message body.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Json(Value),
    /// Text that failed to parse as JSON, passed through unchanged.
    Raw(String),
    /// Binary frame that is not UTF-8, passed through unchanged.
    Binary(Vec<u8>),
}

impl StreamPayload {
    /// Parse as JSON, falling back to the raw text.
    pub fn parse(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Self::Json(value),
            Err(e) => {
                debug!(error = %e, len = text.len(), "Non-JSON stream payload, delivering raw");
                Self::Raw(text)
            }
        }
    }

    /// Decode a binary frame. UTF-8 frames are handled like text.
    pub fn from_binary(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::parse(text),
            Err(e) => {
                debug!(len = e.as_bytes().len(), "Non-UTF-8 binary stream payload");
                Self::Binary(e.into_bytes())
            }
        }
    }

    /// Payload as a JSON value. Raw text becomes a JSON string and binary
    /// bytes an array of numbers.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw(text) => Value::String(text),
            Self::Binary(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        }
    }
}

/// Callback receiving every event of one client.
pub type EventHandler = Arc<dyn Fn(StreamEvent) + Send + Sync>;
