// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Correlation id generation.
//!
//! Ids combine the issue time in milliseconds, a process-local sequence
//! number, and a random component: `{time_ms:x}-{seq:x}-{rand:08x}`. The
//! sequence alone guarantees uniqueness within a process; the time and
//! random parts keep ids distinct across processes sharing a relay.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh correlation id.
pub fn correlation_id() -> String {
    let time_ms = Utc::now().timestamp_millis().max(0) as u64;
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let random: u32 = rand::random();
    format!("{:x}-{:x}-{:08x}", time_ms, seq, random)
}

/// Id of the sub-request at `index` inside the batch `outer`.
pub fn inner_id(outer: &str, index: usize) -> String {
    format!("{}_{}", outer, index)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
