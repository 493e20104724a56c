// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered transport fallback.

use futures_util::future::BoxFuture;
use kl_core::Request;
use serde_json::Value;
use tracing::{debug, warn};

use super::RequestTransport;
use crate::batch::BatchResults;
use crate::error::{ClientError, ClientResult, TransportFailure, TransportKind};

/// Transports in priority order, fixed at construction.
///
/// A request goes to the first transport; a transport-level failure moves it
/// to the next one. Any other outcome, including an application error, is
/// final. Each transport assigns its own correlation ids, so a request that
/// falls through is re-issued with fresh ids.
pub struct FallbackChain {
    transports: Vec<Box<dyn RequestTransport>>,
}

impl FallbackChain {
    pub fn new(transports: Vec<Box<dyn RequestTransport>>) -> Self {
        FallbackChain { transports }
    }

    pub fn kinds(&self) -> Vec<TransportKind> {
        self.transports.iter().map(|t| t.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    pub async fn request(&self, request: &Request) -> ClientResult<Value> {
        self.run(&request.command, |transport| transport.request(request))
            .await
    }

    pub async fn batch(&self, requests: &[Request]) -> ClientResult<BatchResults> {
        self.run("batch", |transport| transport.batch(requests))
            .await
    }

    async fn run<'a, T, F>(&'a self, command: &str, mut call: F) -> ClientResult<T>
    where
        F: FnMut(&'a dyn RequestTransport) -> BoxFuture<'a, ClientResult<T>>,
    {
        if self.transports.is_empty() {
            return Err(ClientError::NoTransports);
        }

        let mut failures = Vec::new();
        for transport in &self.transports {
            let kind = transport.kind();
            match call(transport.as_ref()).await {
                Err(ClientError::Transport(error)) => {
                    warn!(transport = %kind, command, error = %error, "transport failed, falling through");
                    failures.push(TransportFailure { kind, error });
                }
                outcome => {
                    if !failures.is_empty() {
                        debug!(transport = %kind, command, skipped = failures.len(), "served by fallback transport");
                    }
                    return outcome;
                }
            }
        }
        Err(ClientError::TransportsExhausted(failures))
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
