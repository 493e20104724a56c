// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Batch dispatch.
//!
//! A [`BatchPlan`] packages N sub-requests under one outer correlation id
//! with inner ids `outerId_index`, and maps the per-item results of the
//! combined response back onto the input order. Each transport attempt
//! builds its own plan, so a batch re-issued on another transport carries
//! fresh ids.

use std::collections::HashMap;

use kl_core::{Access, BatchItem, ClientMessage, Request, RequestEnvelope};
use serde_json::{json, Value};

use crate::error::{ClientError, ClientResult};
use crate::id;

/// Per-item outcomes of a batch, in input order.
pub type BatchResults = Vec<ClientResult<Value>>;

/// Checks the batch size against `1..=max`.
pub fn validate(len: usize, max: usize) -> ClientResult<()> {
    if len == 0 {
        return Err(ClientError::EmptyBatch);
    }
    if len > max {
        return Err(ClientError::BatchTooLarge { len, max });
    }
    Ok(())
}

/// Classification of a batch for invalidation.
pub fn access(requests: &[Request]) -> Access {
    Access::Batch(requests.iter().map(Request::access).collect())
}

/// One wire-level attempt at a batch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    outer_id: String,
    envelopes: Vec<RequestEnvelope>,
    methods: Vec<&'static str>,
}

impl BatchPlan {
    /// Assigns a fresh outer id and one inner id per sub-request.
    pub fn new(requests: &[Request]) -> Self {
        let outer_id = id::correlation_id();
        let envelopes = requests
            .iter()
            .enumerate()
            .map(|(index, request)| RequestEnvelope {
                id: id::inner_id(&outer_id, index),
                command: request.command.clone(),
                body: request.body.clone(),
            })
            .collect();
        let methods = requests.iter().map(|r| r.method.as_str()).collect();
        BatchPlan {
            outer_id,
            envelopes,
            methods,
        }
    }

    pub fn outer_id(&self) -> &str {
        &self.outer_id
    }

    pub fn inner_ids(&self) -> impl Iterator<Item = &str> {
        self.envelopes.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// The single persistent-channel message carrying the whole batch.
    pub fn to_message(&self) -> ClientMessage {
        ClientMessage::batch(self.outer_id.clone(), self.envelopes.clone())
    }

    /// JSON body for HTTP transports: the envelope plus each sub-method.
    pub fn to_http_body(&self) -> Value {
        let requests: Vec<Value> = self
            .envelopes
            .iter()
            .zip(&self.methods)
            .map(|(envelope, method)| {
                json!({
                    "id": envelope.id,
                    "command": envelope.command,
                    "body": envelope.body,
                    "method": method,
                })
            })
            .collect();
        json!({ "id": self.outer_id, "requests": requests })
    }

    /// Maps per-item results back onto input order.
    ///
    /// Items are matched by inner id; an item the server left out fails with
    /// a protocol error, unknown items are ignored.
    pub fn fan_out(&self, items: Vec<BatchItem>) -> BatchResults {
        let mut by_id: HashMap<String, BatchItem> =
            items.into_iter().map(|item| (item.id.clone(), item)).collect();
        self.envelopes
            .iter()
            .map(|envelope| match by_id.remove(&envelope.id) {
                Some(item) => item_result(item),
                None => Err(ClientError::Protocol(format!(
                    "batch response is missing item '{}'",
                    envelope.id
                ))),
            })
            .collect()
    }
}

/// Renders results as one JSON array: `{"data": ..}` per success,
/// `{"error": .., "status": ..}` per failure.
pub fn report(results: &BatchResults) -> Value {
    let items: Vec<Value> = results
        .iter()
        .map(|result| match result {
            Ok(data) => json!({ "data": data }),
            Err(ClientError::Application { status, message }) => {
                json!({ "error": message, "status": status })
            }
            Err(e) => json!({ "error": e.to_string() }),
        })
        .collect();
    Value::Array(items)
}

fn item_result(item: BatchItem) -> ClientResult<Value> {
    match (item.error, item.data) {
        (Some(message), _) => Err(ClientError::application(item.status, message)),
        (None, data) => Ok(data.unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
