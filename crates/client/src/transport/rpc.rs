// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Experimental RPC transport.
//!
//! Posts the same envelopes the persistent channel carries to a single
//! endpoint and reads one server message back, so the relay protocol can be
//! exercised without holding a socket open.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use kl_core::{ClientMessage, Request, ServerMessage};
use serde_json::Value;
use tracing::debug;

use super::http::{authorize, read_body, send_error};
use super::RequestTransport;
use crate::batch::{BatchPlan, BatchResults};
use crate::error::{ClientError, ClientResult, TransportError, TransportKind};
use crate::id::correlation_id;

/// Envelope-over-HTTP transport.
pub struct RpcTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RpcTransport {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        RpcTransport {
            client,
            url: url.into(),
            api_key,
            timeout,
        }
    }

    async fn exchange(&self, message: &ClientMessage) -> ClientResult<ServerMessage> {
        let json = message
            .to_json()
            .map_err(|e| ClientError::Serialization(e.to_string()))?;
        let builder = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json);
        let response = authorize(builder, self.api_key.as_deref())
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let text = read_body(response, self.timeout).await?;
        ServerMessage::from_json(&text)
            .map_err(|e| ClientError::Protocol(format!("invalid rpc response: {}", e)))
    }

    async fn send(&self, request: &Request) -> ClientResult<Value> {
        let id = correlation_id();
        debug!(id = %id, command = %request.command, "rpc request");
        let message = ClientMessage::request(id.clone(), request.command.clone(), request.body.clone());
        match self.exchange(&message).await? {
            ServerMessage::Response { id: got, data, .. } if got == id => Ok(data),
            ServerMessage::Error { id: got, error, status, .. }
                if got.as_deref().is_none_or(|got| got == id) =>
            {
                Err(ClientError::application(status, error))
            }
            other => Err(unexpected(&id, &other)),
        }
    }

    async fn send_batch(&self, requests: &[Request]) -> ClientResult<BatchResults> {
        let plan = BatchPlan::new(requests);
        debug!(id = %plan.outer_id(), len = plan.len(), "rpc batch");
        match self.exchange(&plan.to_message()).await? {
            ServerMessage::BatchResponse { id, data, .. } if id == plan.outer_id() => {
                Ok(plan.fan_out(data))
            }
            ServerMessage::Error { error, status, .. } => {
                Err(ClientError::application(status, error))
            }
            other => Err(unexpected(plan.outer_id(), &other)),
        }
    }
}

impl RequestTransport for RpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Rpc
    }

    fn request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, ClientResult<Value>> {
        self.send(request).boxed()
    }

    fn batch<'a>(&'a self, requests: &'a [Request]) -> BoxFuture<'a, ClientResult<BatchResults>> {
        self.send_batch(requests).boxed()
    }
}

fn unexpected(id: &str, message: &ServerMessage) -> ClientError {
    match message {
        // An endpoint that only speaks heartbeats is not serving requests.
        ServerMessage::Ping { .. } | ServerMessage::Connected { .. } => {
            ClientError::Transport(TransportError::ReceiveFailed(format!(
                "no response for '{}'",
                id
            )))
        }
        other => ClientError::Protocol(format!(
            "unexpected rpc response for '{}': {:?}",
            id,
            other.id()
        )),
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
