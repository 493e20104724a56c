// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection gets a `connected` greeting, then every request runs in
//! its own task so a slow command never holds up the others. Replies funnel
//! through one channel back to the socket writer, which also sends periodic
//! `ping` messages.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use kl_core::protocol::{BatchItem, ClientMessage, ControlMessage, RequestEnvelope, ServerMessage};

use crate::state::ServerState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Server tunables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How often to ping each connection; `None` disables pings.
    pub ping_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            ping_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// A running server. Dropping it stops the accept loop and closes every
/// connection.
pub struct Server {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    kick_tx: watch::Sender<u64>,
    task: JoinHandle<()>,
}

impl Server {
    /// Binds `addr` and starts accepting connections in the background.
    pub async fn bind(
        addr: SocketAddr,
        state: ServerState,
        config: ServerConfig,
    ) -> io::Result<Server> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on: {}", local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (kick_tx, kick_rx) = watch::channel(0);
        let signals = Signals {
            shutdown: shutdown_rx,
            kick: kick_rx,
        };
        let task = tokio::spawn(accept_loop(listener, state, config, signals));

        Ok(Server {
            local_addr,
            shutdown_tx,
            kick_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The `ws://` URL clients dial.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Closes every open connection with a restart code while continuing
    /// to accept new ones.
    pub fn drop_connections(&self) {
        self.kick_tx.send_modify(|generation| *generation += 1);
    }

    /// Stops accepting, closes every connection, and waits for them to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("accept loop ended abnormally: {}", e);
        }
    }
}

#[derive(Clone)]
struct Signals {
    shutdown: watch::Receiver<bool>,
    kick: watch::Receiver<u64>,
}

async fn accept_loop(
    listener: TcpListener,
    state: ServerState,
    config: ServerConfig,
    mut signals: Signals,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        continue;
                    }
                };
                let state = state.clone();
                let config = config.clone();
                // Earlier kicks must not reach connections accepted after them.
                let _ = signals.kick.borrow_and_update();
                let signals = signals.clone();
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer_addr, state, config, signals).await {
                        error!("Connection error from {}: {}", peer_addr, e);
                    }
                });
            }
            _ = signals.shutdown.changed() => break,
            // Reap finished connections so the set stays small.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    debug!("accept loop stopping, {} connections open", connections.len());
    while connections.join_next().await.is_some() {}
    info!("Server stopped");
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
    config: ServerConfig,
    mut signals: Signals,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);
    state.connection_opened();

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut ticker = config.ping_interval.map(ping_ticker);

    send(&mut ws_sink, &ServerMessage::connected(now_ms())).await?;

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(text.as_str(), &state, &reply_tx);
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            Some(reply) = reply_rx.recv() => {
                send(&mut ws_sink, &reply).await?;
            }

            _ = tick(&mut ticker) => {
                debug!("ping {}", peer_addr);
                send(&mut ws_sink, &ServerMessage::ping(now_ms())).await?;
            }

            _ = signals.kick.changed() => {
                debug!("dropping connection {}", peer_addr);
                close(&mut ws_sink, CloseCode::Restart, "connection reset by server").await;
                break;
            }

            _ = signals.shutdown.changed() => {
                close(&mut ws_sink, CloseCode::Away, "server shutting down").await;
                break;
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Parses one text frame and schedules its reply.
fn handle_text(text: &str, state: &ServerState, replies: &mpsc::UnboundedSender<ServerMessage>) {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("malformed message: {}", e);
            let _ = replies.send(ServerMessage::Error {
                id: None,
                error: format!("malformed message: {}", e),
                status: Some(400),
                timestamp: now_ms(),
            });
            return;
        }
    };

    match msg {
        ClientMessage::Request(envelope) => {
            debug!("request {} {}", envelope.id, envelope.command);
            let state = state.clone();
            let replies = replies.clone();
            tokio::spawn(async move {
                let _ = replies.send(execute(&state, envelope).await);
            });
        }
        ClientMessage::Control(ControlMessage::Batch { id, requests }) => {
            debug!("batch {} with {} requests", id, requests.len());
            let state = state.clone();
            let replies = replies.clone();
            tokio::spawn(async move {
                let mut items = Vec::with_capacity(requests.len());
                for envelope in requests {
                    items.push(match state.execute(&envelope.command, &envelope.body).await {
                        Ok(data) => BatchItem::ok(envelope.id, data),
                        Err(e) => BatchItem::failed(envelope.id, e.message, Some(e.status)),
                    });
                }
                let _ = replies.send(ServerMessage::batch_response(id, items, now_ms()));
            });
        }
        ClientMessage::Control(ControlMessage::Pong { timestamp }) => {
            debug!("pong {}", timestamp);
        }
    }
}

async fn execute(state: &ServerState, envelope: RequestEnvelope) -> ServerMessage {
    match state.execute(&envelope.command, &envelope.body).await {
        Ok(data) => ServerMessage::response(envelope.id, data, now_ms()),
        Err(e) => ServerMessage::error(envelope.id, e.message, Some(e.status), now_ms()),
    }
}

async fn send(sink: &mut WsSink, msg: &ServerMessage) -> Result<(), BoxError> {
    let json = msg.to_json()?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

async fn close(sink: &mut WsSink, code: CloseCode, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

fn ping_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
