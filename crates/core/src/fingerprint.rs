// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical request fingerprints.
//!
//! A fingerprint identifies a logical request independently of object key
//! order, command case, and surrounding whitespace. It is the key of both the
//! read cache and the in-flight deduplication map.

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::command::Method;

/// Canonical identity of a (command, method, body) triple.
///
/// Format: `{METHOD}:{command}:{hash}` where hash is the first 32 hex chars of
/// SHA256 over the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    pub fn of(command: &str, method: Method, body: &Value) -> Self {
        let command = command.trim().to_ascii_lowercase();
        let body = canonicalize(body);
        let input = format!("{}\n{}\n{}", method.as_str(), command, body);
        let hash = Sha256::digest(input.as_bytes());
        Fingerprint(format!("{}:{}:{}", method, command, hex::encode(&hash[..16])))
    }

    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuilds a value with object keys in sorted order, recursively.
///
/// A top-level empty object and `null` are the same body.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) if map.is_empty() => Value::Null,
        other => sort_keys(other),
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key.clone(), sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
