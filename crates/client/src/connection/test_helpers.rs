// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mock dialer and channel for driving the connection manager without sockets.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use kl_core::{ClientMessage, ServerMessage};
use tokio::sync::{mpsc, Mutex, Semaphore};

use super::channel::{Channel, Dialer, Inbound};
use super::manager::ConnectionConfig;
use crate::error::{TransportError, TransportResult};

/// Connection settings with short, round numbers for simulated-clock tests.
pub fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        url: "ws://mock".to_string(),
        max_attempts: 5,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        heartbeat_check_interval: Duration::from_secs(30),
        heartbeat_timeout: Duration::from_secs(60),
        fail_fast: false,
    }
}

/// The server side of one mock channel.
pub struct MockPeer {
    sent: mpsc::UnboundedReceiver<ClientMessage>,
    inbound: mpsc::UnboundedSender<TransportResult<Inbound>>,
}

impl MockPeer {
    /// Next message the client wrote.
    pub async fn next_sent(&mut self) -> ClientMessage {
        self.sent.recv().await.expect("client channel dropped")
    }

    /// Next single request the client wrote, skipping pongs.
    pub async fn next_request(&mut self) -> (String, String) {
        loop {
            if let ClientMessage::Request(envelope) = self.next_sent().await {
                return (envelope.id, envelope.command);
            }
        }
    }

    /// Returns messages written so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<ClientMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.sent.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Delivers a server message to the client.
    pub fn reply(&self, message: ServerMessage) {
        let _ = self.inbound.send(Ok(Inbound::Message(message)));
    }

    /// Delivers raw inbound data to the client.
    pub fn push(&self, inbound: TransportResult<Inbound>) {
        let _ = self.inbound.send(inbound);
    }

    /// Closes the channel from the server side.
    pub fn close(self, code: Option<u16>) {
        let _ = self.inbound.send(Ok(Inbound::Closed { code }));
    }
}

struct MockChannel {
    sent: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<TransportResult<Inbound>>,
}

impl Channel for MockChannel {
    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>> {
        let result = self
            .sent
            .send(msg)
            .map_err(|_| TransportError::SendFailed("peer gone".into()));
        Box::pin(async move { result })
    }

    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Inbound>> {
        Box::pin(async move {
            match self.inbound.recv().await {
                Some(inbound) => inbound,
                None => Ok(Inbound::Closed { code: None }),
            }
        })
    }

    fn close(&mut self, _code: u16) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// A dialer whose connections are handed to the test as [`MockPeer`]s.
#[derive(Clone)]
pub struct MockDialer {
    dials: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Test-side handle for a [`MockDialer`].
pub struct MockServer {
    dials: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
    gate: Option<Arc<Semaphore>>,
    peers: Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl MockDialer {
    /// Every dial succeeds immediately.
    pub fn new() -> (Arc<Self>, MockServer) {
        Self::build(None)
    }

    /// Dials wait until [`MockServer::open_gate`] is called.
    pub fn gated() -> (Arc<Self>, MockServer) {
        Self::build(Some(Arc::new(Semaphore::new(0))))
    }

    fn build(gate: Option<Arc<Semaphore>>) -> (Arc<Self>, MockServer) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let dials = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let dialer = MockDialer {
            dials: Arc::clone(&dials),
            failures: Arc::clone(&failures),
            gate: gate.clone(),
            peers: peers_tx,
        };
        let server = MockServer {
            dials,
            failures,
            gate,
            peers: Mutex::new(peers_rx),
        };
        (Arc::new(dialer), server)
    }
}

impl Dialer for MockDialer {
    fn dial(&self, _url: &str) -> BoxFuture<'static, TransportResult<Box<dyn Channel>>> {
        let dialer = self.clone();
        Box::pin(async move {
            if let Some(gate) = &dialer.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            dialer.dials.fetch_add(1, Ordering::SeqCst);
            let fail = dialer
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(TransportError::ConnectionFailed("connection refused".into()));
            }

            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let _ = dialer.peers.send(MockPeer {
                sent: sent_rx,
                inbound: inbound_tx,
            });
            Ok(Box::new(MockChannel {
                sent: sent_tx,
                inbound: inbound_rx,
            }) as Box<dyn Channel>)
        })
    }
}

impl MockServer {
    /// Waits for the client's next successful dial.
    pub async fn accept(&self) -> MockPeer {
        self.peers.lock().await.recv().await.expect("dialer dropped")
    }

    /// Makes the next `n` dials fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Lets one gated dial proceed.
    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Number of dials attempted.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
