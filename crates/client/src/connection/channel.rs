// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel abstraction for the persistent WebSocket connection.
//!
//! Provides a trait-based layer that enables:
//! - Real WebSocket connections for production
//! - Mock channels for unit testing

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use kl_core::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{TransportError, TransportResult};

/// What a channel read produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed server message.
    Message(ServerMessage),
    /// Text that did not parse as a server message.
    Malformed { text: String, error: String },
    /// The peer closed the channel.
    Closed { code: Option<u16> },
}

/// A live bidirectional channel.
///
/// `recv` must be cancellation safe: the driver polls it inside `select!`.
pub trait Channel: Send {
    /// Send a message to the server.
    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>>;

    /// Receive the next message.
    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Inbound>>;

    /// Close the channel with the given close code.
    fn close(&mut self, code: u16) -> BoxFuture<'_, TransportResult<()>>;
}

/// Opens channels.
pub trait Dialer: Send + Sync {
    /// Connect to `url`.
    fn dial(&self, url: &str) -> BoxFuture<'static, TransportResult<Box<dyn Channel>>>;
}

/// Dialer for real WebSocket connections using tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

impl Dialer for WebSocketDialer {
    fn dial(&self, url: &str) -> BoxFuture<'static, TransportResult<Box<dyn Channel>>> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            Ok(Box::new(WebSocketChannel { ws }) as Box<dyn Channel>)
        })
    }
}

/// WebSocket channel implementation.
pub struct WebSocketChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Channel for WebSocketChannel {
    fn send(&mut self, msg: ClientMessage) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let json = msg
                .to_json()
                .map_err(|e| TransportError::Serialization(e.to_string()))?;
            self.ws
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Inbound>> {
        Box::pin(async move {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Ok(match ServerMessage::from_json(&text) {
                            Ok(msg) => Inbound::Message(msg),
                            Err(e) => Inbound::Malformed {
                                text: text.as_str().to_string(),
                                error: e.to_string(),
                            },
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Ok(Inbound::Closed {
                            code: frame.map(|f| u16::from(f.code)),
                        });
                    }
                    // Protocol-level ping/pong is answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                    None => return Ok(Inbound::Closed { code: None }),
                }
            }
        })
    }

    fn close(&mut self, code: u16) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: "client closing".into(),
            };
            self.ws
                .close(Some(frame))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }
}
