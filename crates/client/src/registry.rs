// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-request registry.
//!
//! Maps correlation ids to the continuation of the caller waiting on them.
//! Every entry owns a deadline in a [`DelayQueue`]; whichever comes first,
//! a response or the deadline, settles the entry and removes it. Later
//! attempts to settle the same id find nothing and are ignored.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::debug;

use crate::error::{ClientError, ClientResult, TransportError};

struct Pending<T> {
    continuation: oneshot::Sender<ClientResult<T>>,
    timer: delay_queue::Key,
    timeout: Duration,
    issued_at: Instant,
    /// Written to the current channel (as opposed to queued).
    in_flight: bool,
}

/// Outstanding requests keyed by correlation id.
pub struct PendingRegistry<T> {
    entries: HashMap<String, Pending<T>>,
    timers: DelayQueue<String>,
}

impl<T> Default for PendingRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingRegistry<T> {
    pub fn new() -> Self {
        PendingRegistry {
            entries: HashMap::new(),
            timers: DelayQueue::new(),
        }
    }

    /// Stores a pending entry and starts its deadline timer.
    ///
    /// Returns false (and rejects `continuation`) if the id is already
    /// registered.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        continuation: oneshot::Sender<ClientResult<T>>,
        timeout: Duration,
    ) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            let _ = continuation.send(Err(ClientError::Protocol(format!(
                "duplicate correlation id '{}'",
                id
            ))));
            return false;
        }
        let timer = self.timers.insert(id.clone(), timeout);
        self.entries.insert(
            id,
            Pending {
                continuation,
                timer,
                timeout,
                issued_at: Instant::now(),
                in_flight: false,
            },
        );
        true
    }

    /// Marks an entry as written to the current channel.
    pub fn mark_in_flight(&mut self, id: &str) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.in_flight = true;
        }
    }

    /// Settles an entry with a value. Returns false for unknown ids.
    pub fn resolve(&mut self, id: &str, value: T) -> bool {
        self.settle(id, Ok(value))
    }

    /// Settles an entry with an error. Returns false for unknown ids.
    pub fn reject(&mut self, id: &str, error: ClientError) -> bool {
        self.settle(id, Err(error))
    }

    fn settle(&mut self, id: &str, result: ClientResult<T>) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            debug!(id, "ignoring result for unknown correlation id");
            return false;
        };
        self.timers.try_remove(&entry.timer);
        debug!(
            id,
            elapsed_ms = entry.issued_at.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "settled pending request"
        );
        // The caller may have gone away; nothing to deliver to then.
        let _ = entry.continuation.send(result);
        true
    }

    /// Rejects every entry written to the channel that just went away.
    ///
    /// Queued entries stay registered and are flushed on the next channel.
    pub fn reject_in_flight(&mut self, error: TransportError) -> usize {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.in_flight)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.reject(id, ClientError::Transport(error.clone()));
        }
        ids.len()
    }

    /// Rejects every entry and clears the registry.
    pub fn reject_all(&mut self, error: TransportError) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            let _ = entry
                .continuation
                .send(Err(ClientError::Transport(error.clone())));
        }
        self.timers.clear();
        count
    }

    /// Waits for the next deadline and rejects that entry with a timeout.
    ///
    /// Returns the id that timed out. Pends forever while no entry is
    /// registered, so it can sit in a `select!` loop.
    pub async fn next_expired(&mut self) -> Option<String> {
        if self.timers.is_empty() {
            return std::future::pending().await;
        }
        let expired = poll_fn(|cx| self.timers.poll_expired(cx)).await?;
        let id = expired.into_inner();
        if let Some(entry) = self.entries.remove(&id) {
            debug!(id = %id, timeout_ms = entry.timeout.as_millis() as u64, "request timed out");
            let _ = entry
                .continuation
                .send(Err(ClientError::Timeout(entry.timeout)));
        }
        Some(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
