// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Logical requests and command classification.
//!
//! Every higher-level operation reduces to a [`Request`]: a command name, a
//! JSON body, and a [`Method`]. Classification by command name decides
//! whether a request may be cached (reads) or must invalidate cached reads
//! (writes).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::fingerprint::Fingerprint;

/// Commands that only read state and are eligible for caching.
pub const READ_COMMANDS: &[&str] = &[
    "get", "list", "find", "search", "count", "keys", "exists", "query", "fetch",
];

/// Writes that affect exactly the key named in their body.
pub const KEYED_WRITE_COMMANDS: &[&str] = &["set", "delete", "increment", "decrement", "expire"];

/// Writes that may affect any number of cached reads.
pub const COLLECTION_WRITE_COMMANDS: &[&str] = &["add", "update", "remove", "clear"];

/// Command name of a pass-through batch.
pub const BATCH_COMMAND: &str = "batch";

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Delete,
}

impl Method {
    /// Returns the canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// A logical request: command + body + method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub method: Method,
}

/// Which part of the remote state a write can affect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteScope {
    /// Only reads of this key can be stale.
    Key(String),
    /// Any cached read can be stale.
    Collection,
}

/// How a request interacts with cached state.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Cacheable read, tagged with the key it reads when it names one.
    Read { key: Option<String> },
    /// Write that invalidates cached reads.
    Write(WriteScope),
    /// A batch; each sub-request is classified on its own.
    Batch(Vec<Access>),
}

impl Request {
    /// Creates a request.
    pub fn new(command: impl Into<String>, body: Value, method: Method) -> Self {
        Request {
            command: command.into(),
            body,
            method,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(command: impl Into<String>, body: Value) -> Self {
        Request::new(command, body, Method::Get)
    }

    /// Shorthand for a POST request.
    pub fn post(command: impl Into<String>, body: Value) -> Self {
        Request::new(command, body, Method::Post)
    }

    /// Normalized command name (trimmed, lower-case).
    pub fn normalized_command(&self) -> String {
        self.command.trim().to_ascii_lowercase()
    }

    /// The key named by the body (`name`, falling back to `key`).
    pub fn key(&self) -> Option<&str> {
        ["name", "key"]
            .iter()
            .find_map(|field| self.body.get(field).and_then(Value::as_str))
    }

    /// Canonical fingerprint used as the cache and dedup key.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.command, self.method, &self.body)
    }

    /// Classifies the request by command name.
    ///
    /// Unknown commands fall back to the method: `GET` reads, anything else
    /// is treated as a collection write.
    pub fn access(&self) -> Access {
        let command = self.normalized_command();
        let command = command.as_str();

        if command == BATCH_COMMAND {
            return match batch_requests(&self.body) {
                Ok(requests) => Access::Batch(requests.iter().map(Request::access).collect()),
                Err(_) => Access::Write(WriteScope::Collection),
            };
        }

        if READ_COMMANDS.contains(&command) {
            return Access::Read {
                key: self.key().map(str::to_string),
            };
        }

        if KEYED_WRITE_COMMANDS.contains(&command) {
            return match self.key() {
                Some(key) => Access::Write(WriteScope::Key(key.to_string())),
                None => Access::Write(WriteScope::Collection),
            };
        }

        if COLLECTION_WRITE_COMMANDS.contains(&command) {
            return Access::Write(WriteScope::Collection);
        }

        match self.method {
            Method::Get => Access::Read {
                key: self.key().map(str::to_string),
            },
            Method::Post | Method::Delete => Access::Write(WriteScope::Collection),
        }
    }

    /// Returns true if the request is a cacheable read.
    pub fn is_read(&self) -> bool {
        matches!(self.access(), Access::Read { .. })
    }
}

/// Parses the sub-requests of a pass-through `batch` body.
///
/// Expects `{"requests": [{"command": .., "body": .., "method": ..}, ..]}`.
pub fn batch_requests(body: &Value) -> Result<Vec<Request>, Error> {
    let requests = body
        .get("requests")
        .cloned()
        .ok_or_else(|| Error::InvalidBatch("missing 'requests' array".to_string()))?;
    if !requests.is_array() {
        return Err(Error::InvalidBatch("'requests' must be an array".to_string()));
    }
    Ok(serde_json::from_value(requests)?)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
