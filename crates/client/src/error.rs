// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the keel client.
//!
//! Transport-level failures are recoverable and drive fall-through to the
//! next transport. Everything else is terminal for the request and reaches
//! the caller unchanged.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed while the request was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization of an outbound message failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The connection manager stopped retrying.
    #[error("reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// HTTP request could not be completed.
    #[error("http error: {0}")]
    Http(String),

    /// Gateway reported the service as unreachable.
    #[error("service unavailable (status {status})")]
    Unavailable { status: u16 },
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Which transport produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Persistent WebSocket channel.
    Channel,
    /// Connection-pooled HTTP.
    Http,
    /// Experimental envelope-over-HTTP transport.
    Rpc,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Channel => f.write_str("channel"),
            TransportKind::Http => f.write_str("http"),
            TransportKind::Rpc => f.write_str("rpc"),
        }
    }
}

/// One fall-through step recorded by the transport chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: TransportKind,
    pub error: TransportError,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.error)
    }
}

/// Error type for client operations.
///
/// `Clone` so every caller attached to a deduplicated request receives the
/// same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// Transport error from a single transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Every configured transport failed at the transport level.
    #[error("all transports failed: {}", join_failures(.0))]
    TransportsExhausted(Vec<TransportFailure>),

    /// No response within the deadline.
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The remote service rejected the request.
    #[error("remote error{}: {message}", format_status(.status))]
    Application {
        status: Option<u16>,
        message: String,
    },

    /// A response could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Request body or response payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A batch must contain at least one request.
    #[error("batch is empty")]
    EmptyBatch,

    /// A batch exceeded the configured maximum.
    #[error("batch of {len} requests exceeds maximum of {max}")]
    BatchTooLarge { len: usize, max: usize },

    /// The client has no transport candidates.
    #[error("no transports configured\n  hint: set ws_url, http_url, or rpc_url")]
    NoTransports,

    /// The client was closed.
    #[error("client closed")]
    Closed,

    /// Invalid client construction.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Returns true for failures that may succeed on another transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// Creates an application error.
    pub fn application(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientError::Application {
            status,
            message: message.into(),
        }
    }
}

fn join_failures(failures: &[TransportFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
