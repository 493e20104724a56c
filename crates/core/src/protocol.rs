// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for the persistent channel.
//!
//! The protocol is simple:
//! - Client sends `{id, command, body}` requests, `batch` envelopes, and `pong` replies
//! - Server answers each request id with a `response` or `error`, answers
//!   batches with a single `batch_response`, and sends `ping`/`connected`
//!   liveness messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single request on the wire.
///
/// Plain requests carry no `type` tag; the server recognises them by shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    /// Correlation id echoed in the matching response.
    pub id: String,
    /// Command name, e.g. `get` or `add`.
    pub command: String,
    /// Command arguments.
    #[serde(default)]
    pub body: Value,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClientMessage {
    /// A tagged control message (batch or pong).
    Control(ControlMessage),
    /// An untagged single request.
    Request(RequestEnvelope),
}

/// Tagged client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// N sub-requests sharing one outer correlation id.
    Batch {
        /// Outer correlation id.
        id: String,
        /// Sub-requests, each with an inner id of the form `outerId_index`.
        requests: Vec<RequestEnvelope>,
    },

    /// Reply to a server ping.
    Pong {
        /// Client wall clock in milliseconds.
        timestamp: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Successful result for a request id.
    Response {
        id: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        timestamp: u64,
    },

    /// Application error for a request id.
    ///
    /// An error without an id is a connection-level notice.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default)]
        timestamp: u64,
    },

    /// Heartbeat; must be answered with a pong.
    Ping {
        #[serde(default)]
        timestamp: u64,
    },

    /// Sent once by the server after accepting the channel.
    Connected {
        #[serde(default)]
        timestamp: u64,
    },

    /// Per-item results for a batch, keyed by the outer id.
    BatchResponse {
        id: String,
        #[serde(default)]
        data: Vec<BatchItem>,
        #[serde(default)]
        timestamp: u64,
    },
}

/// The result of one sub-request inside a batch response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    /// Inner id (`outerId_index`).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl BatchItem {
    /// Creates a successful item.
    pub fn ok(id: impl Into<String>, data: Value) -> Self {
        BatchItem {
            id: id.into(),
            data: Some(data),
            error: None,
            status: None,
        }
    }

    /// Creates a failed item.
    pub fn failed(id: impl Into<String>, error: impl Into<String>, status: Option<u16>) -> Self {
        BatchItem {
            id: id.into(),
            data: None,
            error: Some(error.into()),
            status,
        }
    }
}

impl ClientMessage {
    /// Creates a single request message.
    pub fn request(id: impl Into<String>, command: impl Into<String>, body: Value) -> Self {
        ClientMessage::Request(RequestEnvelope {
            id: id.into(),
            command: command.into(),
            body,
        })
    }

    /// Creates a batch message.
    pub fn batch(id: impl Into<String>, requests: Vec<RequestEnvelope>) -> Self {
        ClientMessage::Control(ControlMessage::Batch {
            id: id.into(),
            requests,
        })
    }

    /// Creates a pong message.
    pub fn pong(timestamp: u64) -> Self {
        ClientMessage::Control(ControlMessage::Pong { timestamp })
    }

    /// Returns the correlation id, if the message carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            ClientMessage::Request(envelope) => Some(&envelope.id),
            ClientMessage::Control(ControlMessage::Batch { id, .. }) => Some(id),
            ClientMessage::Control(ControlMessage::Pong { .. }) => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Response message.
    pub fn response(id: impl Into<String>, data: Value, timestamp: u64) -> Self {
        ServerMessage::Response {
            id: id.into(),
            data,
            timestamp,
        }
    }

    /// Creates an Error message for a request id.
    pub fn error(
        id: impl Into<String>,
        error: impl Into<String>,
        status: Option<u16>,
        timestamp: u64,
    ) -> Self {
        ServerMessage::Error {
            id: Some(id.into()),
            error: error.into(),
            status,
            timestamp,
        }
    }

    /// Creates a Ping message.
    pub fn ping(timestamp: u64) -> Self {
        ServerMessage::Ping { timestamp }
    }

    /// Creates a Connected message.
    pub fn connected(timestamp: u64) -> Self {
        ServerMessage::Connected { timestamp }
    }

    /// Creates a BatchResponse message.
    pub fn batch_response(id: impl Into<String>, data: Vec<BatchItem>, timestamp: u64) -> Self {
        ServerMessage::BatchResponse {
            id: id.into(),
            data,
            timestamp,
        }
    }

    /// Returns the correlation id this message answers, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            ServerMessage::Response { id, .. } | ServerMessage::BatchResponse { id, .. } => {
                Some(id)
            }
            ServerMessage::Error { id, .. } => id.as_deref(),
            ServerMessage::Ping { .. } | ServerMessage::Connected { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
