// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent channel management.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐  Command   ┌──────────────┐     ┌─────────────┐
//! │ ConnectionManager │───────────►│    Driver    │────►│   Channel   │
//! │     (handle)      │◄───────────│ (one task)   │◄────│   (trait)   │
//! └───────────────────┘  oneshot   └──────────────┘     └─────────────┘
//!                                    │        │
//!                                    ▼        ▼
//!                             ┌──────────┐ ┌──────────────┐
//!                             │ Machine  │ │   Pending    │
//!                             │ (states) │ │   Registry   │
//!                             └──────────┘ └──────────────┘
//! ```
//!
//! # Features
//!
//! - Lazy connect on first request, shared by concurrent callers
//! - FIFO queue for requests issued while the channel is not open
//! - Exponential backoff with a bounded attempt count
//! - Heartbeat watchdog that treats silence as a dropped channel
//! - Injectable dialer/channel traits for testing

mod backoff;
mod channel;
mod manager;
mod state;

pub use backoff::Backoff;
pub use channel::{Channel, Dialer, Inbound, WebSocketChannel, WebSocketDialer};
pub use manager::{ConnectionConfig, ConnectionManager, Reply};
pub use state::{
    ConnectionEvent, ConnectionState, Effect, Input, Machine, SharedConnectionState, NORMAL_CLOSE,
};

#[cfg(test)]
pub(crate) mod test_helpers;
