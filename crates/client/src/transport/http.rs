// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection-pooled HTTP transport.
//!
//! A request for `command` maps to `{base}/{command}`:
//!
//! | Method | Body placement |
//! |--------|----------------|
//! | GET    | `?body=<json>` query parameter (omitted when empty) |
//! | POST   | JSON request body |
//! | DELETE | JSON request body |
//!
//! Batches are posted to `{base}/batch` and answered with a JSON array of
//! per-item results.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use kl_core::{BatchItem, Method, Request};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::RequestTransport;
use crate::batch::{BatchPlan, BatchResults};
use crate::error::{ClientError, ClientResult, TransportError, TransportKind};

/// Gateway statuses that mean "try another way", not "the request is wrong".
const UNAVAILABLE_STATUSES: &[u16] = &[502, 503, 504];

/// Builds the shared connection pool used by the HTTP transports.
pub fn build_http_client(timeout: Duration, max_idle_per_host: usize) -> ClientResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(max_idle_per_host)
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Request/response transport over pooled HTTP connections.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    /// `timeout` must match the one `client` was built with; it is reported
    /// in timeout errors.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpTransport {
            client,
            base_url,
            api_key,
            timeout,
        }
    }

    fn url(&self, command: &str) -> String {
        format!("{}/{}", self.base_url, command)
    }

    fn builder(&self, request: &Request) -> ClientResult<reqwest::RequestBuilder> {
        let url = self.url(&request.command);
        let builder = match request.method {
            Method::Get => {
                let builder = self.client.get(url);
                if is_empty_body(&request.body) {
                    builder
                } else {
                    let body = serde_json::to_string(&request.body)
                        .map_err(|e| ClientError::Serialization(e.to_string()))?;
                    builder.query(&[("body", body)])
                }
            }
            Method::Post => self.client.post(url).json(&request.body),
            Method::Delete => self.client.delete(url).json(&request.body),
        };
        Ok(authorize(builder, self.api_key.as_deref()))
    }

    async fn send(&self, request: &Request) -> ClientResult<Value> {
        debug!(command = %request.command, method = %request.method, "http request");
        let response = self
            .builder(request)?
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let text = read_body(response, self.timeout).await?;
        parse_json(&text)
    }

    async fn send_batch(&self, requests: &[Request]) -> ClientResult<BatchResults> {
        let plan = BatchPlan::new(requests);
        debug!(id = %plan.outer_id(), len = plan.len(), "http batch");
        let builder = self.client.post(self.url("batch")).json(&plan.to_http_body());
        let response = authorize(builder, self.api_key.as_deref())
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;
        let text = read_body(response, self.timeout).await?;
        let items: Vec<BatchItem> = serde_json::from_str(&text)
            .map_err(|e| ClientError::Protocol(format!("invalid batch response: {}", e)))?;
        Ok(plan.fan_out(items))
    }
}

impl RequestTransport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, ClientResult<Value>> {
        self.send(request).boxed()
    }

    fn batch<'a>(&'a self, requests: &'a [Request]) -> BoxFuture<'a, ClientResult<BatchResults>> {
        self.send_batch(requests).boxed()
    }
}

pub(crate) fn authorize(
    builder: reqwest::RequestBuilder,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    match api_key {
        Some(key) => builder.bearer_auth(key),
        None => builder,
    }
}

/// Maps a failed send: timeouts are final, everything else is recoverable.
pub(crate) fn send_error(error: reqwest::Error, timeout: Duration) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout(timeout)
    } else {
        ClientError::Transport(TransportError::Http(error.to_string()))
    }
}

/// Reads a response body, classifying the status first.
///
/// 2xx yields the body text. 502/503/504 are transport failures. Any other
/// status is an application error carrying the status and the `error` field
/// of a JSON body (or the raw text).
pub(crate) async fn read_body(response: reqwest::Response, timeout: Duration) -> ClientResult<String> {
    let status = response.status();
    if UNAVAILABLE_STATUSES.contains(&status.as_u16()) {
        return Err(TransportError::Unavailable {
            status: status.as_u16(),
        }
        .into());
    }
    let text = response.text().await.map_err(|e| send_error(e, timeout))?;
    if !status.is_success() {
        return Err(ClientError::application(
            Some(status.as_u16()),
            error_message(status, &text),
        ));
    }
    Ok(text)
}

fn parse_json(text: &str) -> ClientResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text)
        .map_err(|e| ClientError::Protocol(format!("invalid JSON response: {}", e)))
}

fn error_message(status: StatusCode, text: &str) -> String {
    let from_json = serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string));
    match from_json {
        Some(message) => message,
        None if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => text.trim().to_string(),
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
