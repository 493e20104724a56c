// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-flight request deduplication.
//!
//! Concurrent identical requests share one [`Shared`] future keyed by
//! fingerprint. The shared future removes its own map entry as its last step,
//! before any caller observes the output, so a request issued after
//! settlement always starts a new operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use kl_core::Fingerprint;
use tracing::debug;

use crate::lock;

/// A deduplicated operation shared by every attached caller.
pub type SharedOp<T> = Shared<BoxFuture<'static, T>>;

/// Operations currently in flight, keyed by fingerprint.
pub struct InFlight<T: Clone> {
    ops: Arc<Mutex<HashMap<Fingerprint, (u64, SharedOp<T>)>>>,
    generation: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> InFlight<T> {
    pub fn new() -> Self {
        InFlight {
            ops: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Attaches to the in-flight operation for `fingerprint`, or starts one.
    ///
    /// `start` is only called when no identical operation is outstanding.
    /// The returned flag is true when the caller was attached to an existing
    /// operation.
    pub fn join_or_start<F, Fut>(&self, fingerprint: Fingerprint, start: F) -> (SharedOp<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut ops = lock(&self.ops);
        if let Some((_, op)) = ops.get(&fingerprint) {
            debug!(fingerprint = %fingerprint, "attached to in-flight request");
            return (op.clone(), true);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let map = Arc::clone(&self.ops);
        let key = fingerprint.clone();
        let operation = start();
        let op = async move {
            let output = operation.await;
            {
                let mut ops = lock(&map);
                // A forgotten operation may already have been replaced.
                if ops.get(&key).is_some_and(|(current, _)| *current == generation) {
                    ops.remove(&key);
                }
            }
            output
        }
        .boxed()
        .shared();

        ops.insert(fingerprint, (generation, op.clone()));
        (op, false)
    }

    /// Detaches every in-flight operation from the map.
    ///
    /// Callers already attached still receive their result; new callers
    /// start fresh operations.
    pub fn forget_all(&self) -> usize {
        let mut ops = lock(&self.ops);
        let count = ops.len();
        ops.clear();
        count
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        lock(&self.ops).contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        lock(&self.ops).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ops).is_empty()
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
