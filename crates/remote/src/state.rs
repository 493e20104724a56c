// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! An in-memory key/value store shared by every connection, plus counters
//! that tests use to observe how much traffic actually reached the server.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

/// Longest delay `sleep` will honor.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// A command the store refused, with the status reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub status: u16,
    pub message: String,
}

impl CommandError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        CommandError {
            status,
            message: message.into(),
        }
    }

    fn missing(field: &str) -> Self {
        CommandError::new(400, format!("missing '{}'", field))
    }
}

/// Shared server state.
#[derive(Clone, Default)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

#[derive(Default)]
struct ServerStateInner {
    entries: Mutex<BTreeMap<String, Value>>,
    /// Commands executed, batch members included.
    served: AtomicU64,
    /// Connections accepted.
    connections: AtomicU64,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes one command against the store.
    ///
    /// | Command  | Body                 | Result |
    /// |----------|----------------------|--------|
    /// | `get`    | `name`               | stored value, 404 if absent |
    /// | `set`    | `name`, `value`      | `true` |
    /// | `delete` | `name`               | whether it existed |
    /// | `list`   |                      | `[{name, value}]` |
    /// | `keys`   |                      | `[name]` |
    /// | `count`  |                      | number of entries |
    /// | `add`    | `name`, `value`      | `true`, 409 if present |
    /// | `update` | `name`, `value`      | `true`, 404 if absent |
    /// | `remove` | `name`               | removed value, 404 if absent |
    /// | `clear`  |                      | number removed |
    /// | `echo`   | any                  | the body |
    /// | `sleep`  | `ms`                 | the body, after `ms` |
    /// | `fail`   | `status`, `message`  | always an error |
    pub async fn execute(&self, command: &str, body: &Value) -> Result<Value, CommandError> {
        self.inner.served.fetch_add(1, Ordering::SeqCst);

        match command {
            "get" => {
                let name = name(body)?;
                let entries = self.inner.entries.lock().await;
                entries
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CommandError::new(404, format!("key not found: {}", name)))
            }
            "set" => {
                let name = name(body)?;
                let value = value(body)?;
                self.inner
                    .entries
                    .lock()
                    .await
                    .insert(name.to_string(), value);
                Ok(json!(true))
            }
            "delete" => {
                let name = name(body)?;
                let existed = self.inner.entries.lock().await.remove(name).is_some();
                Ok(json!(existed))
            }
            "list" => {
                let entries = self.inner.entries.lock().await;
                let items: Vec<Value> = entries
                    .iter()
                    .map(|(name, value)| json!({ "name": name, "value": value }))
                    .collect();
                Ok(Value::Array(items))
            }
            "keys" => {
                let entries = self.inner.entries.lock().await;
                Ok(json!(entries.keys().collect::<Vec<_>>()))
            }
            "count" => Ok(json!(self.inner.entries.lock().await.len())),
            "add" => {
                let name = name(body)?;
                let value = value(body)?;
                let mut entries = self.inner.entries.lock().await;
                if entries.contains_key(name) {
                    return Err(CommandError::new(409, format!("key exists: {}", name)));
                }
                entries.insert(name.to_string(), value);
                Ok(json!(true))
            }
            "update" => {
                let name = name(body)?;
                let value = value(body)?;
                let mut entries = self.inner.entries.lock().await;
                match entries.get_mut(name) {
                    Some(slot) => {
                        *slot = value;
                        Ok(json!(true))
                    }
                    None => Err(CommandError::new(404, format!("key not found: {}", name))),
                }
            }
            "remove" => {
                let name = name(body)?;
                self.inner
                    .entries
                    .lock()
                    .await
                    .remove(name)
                    .ok_or_else(|| CommandError::new(404, format!("key not found: {}", name)))
            }
            "clear" => {
                let mut entries = self.inner.entries.lock().await;
                let removed = entries.len();
                entries.clear();
                Ok(json!(removed))
            }
            "echo" => Ok(body.clone()),
            "sleep" => {
                let ms = body.get("ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms).min(MAX_SLEEP)).await;
                Ok(body.clone())
            }
            "fail" => {
                let status = body
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(500);
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("requested failure");
                Err(CommandError::new(status, message))
            }
            other => Err(CommandError::new(404, format!("unknown command: {}", other))),
        }
    }

    /// Commands executed so far.
    pub fn served(&self) -> u64 {
        self.inner.served.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.inner.connections.fetch_add(1, Ordering::SeqCst);
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> u64 {
        self.inner.connections.load(Ordering::SeqCst)
    }
}

fn name(body: &Value) -> Result<&str, CommandError> {
    body.get("name")
        .or_else(|| body.get("key"))
        .and_then(Value::as_str)
        .ok_or_else(|| CommandError::missing("name"))
}

fn value(body: &Value) -> Result<Value, CommandError> {
    body.get("value")
        .cloned()
        .ok_or_else(|| CommandError::missing("value"))
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
