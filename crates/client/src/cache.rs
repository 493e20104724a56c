// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read cache.
//!
//! Successful read responses keyed by request [`Fingerprint`]. Entries older
//! than the time-to-live are treated as absent. When the store is full the
//! oldest entry is evicted.
//!
//! Every invalidation advances an epoch. A read records the epoch before it
//! is dispatched and only populates the cache if no invalidation happened in
//! between, so a response that raced a write can never be served after it.

use std::collections::HashMap;
use std::time::Duration;

use kl_core::Fingerprint;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// Key named by the read, used for targeted invalidation.
    key: Option<String>,
    written_at: Instant,
}

/// Bounded TTL cache of read responses.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    ttl: Duration,
    capacity: usize,
    epoch: u64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        ResponseCache {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
            epoch: 0,
        }
    }

    /// Returns a fresh entry, dropping it if it has expired.
    pub fn get(&mut self, fingerprint: &Fingerprint) -> Option<Value> {
        let entry = self.entries.get(fingerprint)?;
        if entry.written_at.elapsed() >= self.ttl {
            debug!(fingerprint = %fingerprint, "cache entry expired");
            self.entries.remove(fingerprint);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stores a response unconditionally.
    pub fn insert(&mut self, fingerprint: Fingerprint, key: Option<String>, value: Value) {
        if !self.entries.contains_key(&fingerprint) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                key,
                written_at: Instant::now(),
            },
        );
    }

    /// Stores a response only if nothing was invalidated since `epoch`.
    ///
    /// Returns whether the response was stored.
    pub fn insert_if_current(
        &mut self,
        epoch: u64,
        fingerprint: Fingerprint,
        key: Option<String>,
        value: Value,
    ) -> bool {
        if epoch != self.epoch {
            debug!(fingerprint = %fingerprint, "discarding read that raced an invalidation");
            return false;
        }
        self.insert(fingerprint, key, value);
        true
    }

    /// Removes every entry whose read named `key`.
    pub fn remove_key(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.key.as_deref() != Some(key));
        self.epoch += 1;
        before - self.entries.len()
    }

    /// Removes every entry.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.epoch += 1;
        count
    }

    /// Invalidation counter.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.written_at)
            .map(|(fingerprint, _)| fingerprint.clone());
        if let Some(fingerprint) = oldest {
            debug!(fingerprint = %fingerprint, "evicting oldest cache entry");
            self.entries.remove(&fingerprint);
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
