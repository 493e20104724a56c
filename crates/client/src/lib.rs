// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! keel: request orchestration for a remote data service.
//!
//! Every logical request goes through [`Client::request`], which layers a
//! read cache, in-flight deduplication, and a transport fallback chain
//! (persistent channel, pooled HTTP, experimental RPC) over the wire types
//! in `kl-core`.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod batch;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod id;
pub mod invalidation;
pub mod registry;
pub mod transport;

pub use client::{Client, ClientOptions};
pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionState};
pub use error::{ClientError, ClientResult, TransportError, TransportKind};
pub use kl_core::{Method, Request};

/// Locks a mutex, recovering the data if a holder panicked.
///
/// Every critical section in this crate leaves its map consistent, so a
/// poisoned guard is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
