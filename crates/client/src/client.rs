// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The single entry point for remote requests.
//!
//! Provides a high-level interface for:
//! - Cached, deduplicated reads
//! - Writes that invalidate what they could have made stale
//! - Batches of up to `max_batch_size` sub-requests
//! - Transport fallback (channel, then HTTP, then RPC)
//!
//! ```text
//! request ─► read? ─yes─► cache hit? ─yes─► value
//!              │               │no
//!              │no             ▼
//!              │          in-flight? ─yes─► attach
//!              │               │no
//!              ▼               ▼
//!          FallbackChain ◄─────┘
//!              │
//!              ├─ read ok  ─► cache insert (if no write happened meanwhile)
//!              └─ write ok ─► invalidate + forget in-flight reads
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kl_core::command::batch_requests;
use kl_core::{Access, Method, Request};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::batch::{self, BatchResults};
use crate::cache::ResponseCache;
use crate::config::ClientConfig;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Dialer, WebSocketDialer,
};
use crate::dedup::InFlight;
use crate::error::{ClientError, ClientResult, TransportKind};
use crate::invalidation;
use crate::lock;
use crate::transport::{
    build_http_client, ChannelTransport, FallbackChain, HttpTransport, RequestTransport,
    RpcTransport,
};

/// Cache and batch limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub max_batch_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            cache_ttl: Duration::from_secs(60),
            cache_capacity: 500,
            max_batch_size: 100,
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        ClientOptions {
            cache_ttl: config.cache_ttl(),
            cache_capacity: config.cache_capacity,
            max_batch_size: config.max_batch_size,
        }
    }
}

/// Request client. Cheap to clone; clones share cache, in-flight reads, and
/// the persistent channel.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    options: ClientOptions,
    chain: FallbackChain,
    manager: Option<ConnectionManager>,
    cache: Mutex<ResponseCache>,
    in_flight: InFlight<ClientResult<Value>>,
    closed: AtomicBool,
}

impl Client {
    /// Builds a client from configuration. Must be called within a tokio
    /// runtime when a channel endpoint is configured.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Self::with_dialer(config, Arc::new(WebSocketDialer))
    }

    /// Like [`new`](Self::new), with a custom channel dialer.
    pub fn with_dialer(config: &ClientConfig, dialer: Arc<dyn Dialer>) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let mut transports: Vec<Box<dyn RequestTransport>> = Vec::new();
        let manager = config
            .connection()
            .map(|connection| ConnectionManager::spawn(connection, dialer));
        if let Some(manager) = &manager {
            transports.push(Box::new(ChannelTransport::new(
                manager.clone(),
                config.request_timeout(),
            )));
        }

        if config.http_url.is_some() || config.rpc_url.is_some() {
            let pool = build_http_client(config.http_timeout(), config.pool_max_idle_per_host)?;
            if let Some(url) = &config.http_url {
                transports.push(Box::new(HttpTransport::new(
                    pool.clone(),
                    url.clone(),
                    config.api_key.clone(),
                    config.http_timeout(),
                )));
            }
            if let Some(url) = &config.rpc_url {
                transports.push(Box::new(RpcTransport::new(
                    pool,
                    url.clone(),
                    config.api_key.clone(),
                    config.http_timeout(),
                )));
            }
        }

        let client = Self::from_parts(ClientOptions::from_config(config), transports, manager);
        info!(transports = ?client.transports(), "client ready");
        Ok(client)
    }

    /// Assembles a client from prebuilt transports, in priority order.
    ///
    /// `manager` is the connection behind a channel transport, if any; it is
    /// used for warm-up, close, and status.
    pub fn from_parts(
        options: ClientOptions,
        transports: Vec<Box<dyn RequestTransport>>,
        manager: Option<ConnectionManager>,
    ) -> Self {
        let cache = ResponseCache::new(options.cache_ttl, options.cache_capacity);
        Client {
            inner: Arc::new(Inner {
                options,
                chain: FallbackChain::new(transports),
                manager,
                cache: Mutex::new(cache),
                in_flight: InFlight::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Issues `command` with `body` and decodes the result.
    pub async fn request<T: DeserializeOwned>(
        &self,
        command: &str,
        body: Value,
        method: Method,
    ) -> ClientResult<T> {
        let value = self
            .request_value(Request::new(command, body, method))
            .await?;
        serde_json::from_value(value).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Issues a request and returns the raw result.
    pub async fn request_value(&self, request: Request) -> ClientResult<Value> {
        self.ensure_open()?;
        match request.access() {
            Access::Read { key } => self.read(request, key).await,
            Access::Batch(_) => self.pass_through_batch(&request.body).await,
            access => self.write(request, access).await,
        }
    }

    /// `request("batch", {"requests": [..]})`: dispatched through
    /// [`batch`](Self::batch), results rendered by [`batch::report`].
    async fn pass_through_batch(&self, body: &Value) -> ClientResult<Value> {
        let requests =
            batch_requests(body).map_err(|e| ClientError::Serialization(e.to_string()))?;
        let results = self.batch(requests).await?;
        Ok(batch::report(&results))
    }

    async fn read(&self, request: Request, key: Option<String>) -> ClientResult<Value> {
        let fingerprint = request.fingerprint();
        if let Some(value) = lock(&self.inner.cache).get(&fingerprint) {
            debug!(command = %request.command, "cache hit");
            return Ok(value);
        }
        debug!(command = %request.command, "cache miss");

        let inner = Arc::clone(&self.inner);
        let (op, joined) = self
            .inner
            .in_flight
            .join_or_start(fingerprint.clone(), move || {
                let epoch = lock(&inner.cache).epoch();
                async move {
                    let result = inner.chain.request(&request).await;
                    if let Ok(value) = &result {
                        let stored = lock(&inner.cache).insert_if_current(
                            epoch,
                            fingerprint,
                            key,
                            value.clone(),
                        );
                        if !stored {
                            debug!(command = %request.command, "write landed during read, not caching");
                        }
                    }
                    result
                }
            });
        if joined {
            debug!("joined identical in-flight read");
        }
        op.await
    }

    async fn write(&self, request: Request, access: Access) -> ClientResult<Value> {
        let result = self.inner.chain.request(&request).await;
        if result.is_ok() {
            self.invalidate(&access);
        }
        result
    }

    /// Sends `requests` as one batch.
    ///
    /// The outer result fails only if no transport could carry the batch;
    /// per-item failures are reported in order. Every sub-request's
    /// invalidation rule is applied once the batch completes.
    pub async fn batch(&self, requests: Vec<Request>) -> ClientResult<BatchResults> {
        self.ensure_open()?;
        batch::validate(requests.len(), self.inner.options.max_batch_size)?;
        let access = batch::access(&requests);
        let results = self.inner.chain.batch(&requests).await?;
        self.invalidate(&access);
        Ok(results)
    }

    fn invalidate(&self, access: &Access) {
        let invalidated = invalidation::apply(&mut lock(&self.inner.cache), access);
        if invalidated {
            let forgotten = self.inner.in_flight.forget_all();
            if forgotten > 0 {
                debug!(forgotten, "detached in-flight reads after write");
            }
        }
    }

    /// Opens the persistent channel ahead of the first request.
    ///
    /// Also revives a channel that gave up reconnecting. A no-op without a
    /// channel transport.
    pub async fn warm_up(&self) -> ClientResult<()> {
        self.ensure_open()?;
        match &self.inner.manager {
            Some(manager) => Ok(manager.connect().await?),
            None => Ok(()),
        }
    }

    /// Closes the channel, fails everything pending on it, and drops cached
    /// state. Later calls fail with [`ClientError::Closed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(manager) = &self.inner.manager {
            manager.close().await;
        }
        lock(&self.inner.cache).clear();
        self.inner.in_flight.forget_all();
        info!("client closed");
    }

    /// Connection events, if a channel transport is configured.
    pub fn events(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        self.inner.manager.as_ref().map(ConnectionManager::subscribe)
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.inner.manager.as_ref().map(ConnectionManager::state)
    }

    /// One-line status for display.
    pub fn status(&self) -> String {
        match &self.inner.manager {
            Some(manager) => format!("channel {}", manager.shared_state().status_string()),
            None => "no channel".to_string(),
        }
    }

    pub fn transports(&self) -> Vec<TransportKind> {
        self.inner.chain.kinds()
    }

    /// Number of cached responses.
    pub fn cached(&self) -> usize {
        lock(&self.inner.cache).len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
