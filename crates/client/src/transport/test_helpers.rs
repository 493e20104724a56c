// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted transport for exercising the chain and the client without I/O.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use kl_core::Request;
use serde_json::Value;

use super::RequestTransport;
use crate::batch::BatchResults;
use crate::error::{ClientResult, TransportKind};

type Responder = Arc<dyn Fn(&Request) -> ClientResult<Value> + Send + Sync>;
type Delay = Arc<dyn Fn(&Request) -> Duration + Send + Sync>;

/// A transport that answers every request from a closure.
///
/// The answer is computed when the request arrives and delivered after the
/// request's delay, like a server that reads its state and then stalls.
pub struct MockTransport {
    kind: TransportKind,
    responder: Responder,
    delay: Delay,
    log: MockLog,
}

/// Test-side view of what a [`MockTransport`] was asked to do.
#[derive(Clone, Default)]
pub struct MockLog {
    calls: Arc<AtomicUsize>,
    batches: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Request>>>,
}

impl MockLog {
    /// Single requests issued.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Batches issued.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Every request seen, batch members included.
    pub fn seen(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }
}

impl MockTransport {
    pub fn new<F>(kind: TransportKind, responder: F) -> Self
    where
        F: Fn(&Request) -> ClientResult<Value> + Send + Sync + 'static,
    {
        MockTransport {
            kind,
            responder: Arc::new(responder),
            delay: Arc::new(no_delay),
            log: MockLog::default(),
        }
    }

    /// Answers every request with `value`.
    pub fn ok(kind: TransportKind, value: Value) -> Self {
        Self::new(kind, move |_| Ok(value.clone()))
    }

    /// Fails every request with `error`.
    pub fn failing(kind: TransportKind, error: crate::error::ClientError) -> Self {
        Self::new(kind, move |_| Err(error.clone()))
    }

    /// Holds each answer for `delay` of (simulated) time.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    /// Holds each answer for a per-request delay.
    pub fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(&Request) -> Duration + Send + Sync + 'static,
    {
        self.delay = Arc::new(delay);
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    pub fn boxed(self) -> Box<dyn RequestTransport> {
        Box::new(self)
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn no_delay(_: &Request) -> Duration {
    Duration::ZERO
}

impl RequestTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, ClientResult<Value>> {
        async move {
            self.log.calls.fetch_add(1, Ordering::SeqCst);
            self.log.seen.lock().unwrap().push(request.clone());
            let result = (self.responder)(request);
            self.pause((self.delay)(request)).await;
            result
        }
        .boxed()
    }

    fn batch<'a>(&'a self, requests: &'a [Request]) -> BoxFuture<'a, ClientResult<BatchResults>> {
        async move {
            self.log.batches.fetch_add(1, Ordering::SeqCst);
            self.log.seen.lock().unwrap().extend(requests.iter().cloned());
            let mut results = Vec::with_capacity(requests.len());
            let mut delay = Duration::ZERO;
            for request in requests {
                delay = delay.max((self.delay)(request));
                match (self.responder)(request) {
                    Err(e) if e.is_transport() => return Err(e),
                    result => results.push(result),
                }
            }
            self.pause(delay).await;
            Ok(results)
        }
        .boxed()
    }
}
