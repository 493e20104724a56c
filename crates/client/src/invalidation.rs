// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Write-triggered cache invalidation.
//!
//! - Keyed writes remove cached reads of that key.
//! - Collection writes clear the whole cache. There is no dependency
//!   tracking between collection writes and cached reads, so every cached
//!   read is assumed stale.
//! - Batches apply the rule of every sub-request, in order.

use kl_core::{Access, WriteScope};
use tracing::debug;

use crate::cache::ResponseCache;

/// Applies the invalidation rule for a completed request.
///
/// Returns true if anything was invalidated (and the cache epoch advanced).
pub fn apply(cache: &mut ResponseCache, access: &Access) -> bool {
    match access {
        Access::Read { .. } => false,
        Access::Write(WriteScope::Key(key)) => {
            let removed = cache.remove_key(key);
            debug!(key = %key, removed, "invalidated keyed reads");
            true
        }
        Access::Write(WriteScope::Collection) => {
            let removed = cache.clear();
            debug!(removed, "collection write cleared cache");
            true
        }
        Access::Batch(items) => items
            .iter()
            .fold(false, |invalidated, item| apply(cache, item) || invalidated),
    }
}

#[cfg(test)]
#[path = "invalidation_tests.rs"]
mod tests;
