// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request transports and the fallback chain.
//!
//! Provides a trait-based transport layer that enables:
//! - The persistent channel, pooled HTTP, and RPC transports for production
//! - Mock transports for unit testing

mod chain;
mod channel;
mod http;
mod rpc;

pub use chain::FallbackChain;
pub use channel::ChannelTransport;
pub use http::{build_http_client, HttpTransport};
pub use rpc::RpcTransport;

use futures_util::future::BoxFuture;
use kl_core::Request;
use serde_json::Value;

use crate::batch::BatchResults;
use crate::error::{ClientResult, TransportKind};

/// One way of carrying a logical request to the remote service.
///
/// Every implementation exposes the same contract: issue the request and
/// resolve to its value or error. Failures that another transport could
/// recover from must be reported as `ClientError::Transport`.
pub trait RequestTransport: Send + Sync {
    /// Which transport this is, for logging and failure reports.
    fn kind(&self) -> TransportKind;

    /// Issues one request.
    fn request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, ClientResult<Value>>;

    /// Issues a whole batch as one exchange.
    ///
    /// Per-item application errors are reported in the results; a transport
    /// failure fails the whole batch.
    fn batch<'a>(&'a self, requests: &'a [Request]) -> BoxFuture<'a, ClientResult<BatchResults>>;
}

#[cfg(test)]
pub(crate) mod test_helpers;
