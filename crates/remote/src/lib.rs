// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kl-remote: WebSocket relay server for the keel persistent channel.
//!
//! Serves the channel protocol from [`kl_core::protocol`] over an in-memory
//! key/value store. The `keel` client's integration tests run it in-process.

pub mod server;
pub mod state;

pub use server::{Server, ServerConfig};
pub use state::{CommandError, ServerState};
