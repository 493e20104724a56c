// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! kl-core: Shared types for the keel client and relay.
//!
//! This crate provides the wire protocol, the logical request model, command
//! classification, and request fingerprints used by both the `keel` client
//! library and the `kl-remote` relay server. It performs no I/O.

pub mod command;
pub mod error;
pub mod fingerprint;
pub mod protocol;

pub use command::{Access, Method, Request, WriteScope};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use protocol::{BatchItem, ClientMessage, ControlMessage, RequestEnvelope, ServerMessage};
