// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is read from a TOML file (default
//! `$XDG_CONFIG_HOME/keel/config.toml`) and includes:
//! - transport endpoints (`ws_url`, `http_url`, `rpc_url`) and the bearer `api_key`
//! - request, cache, reconnect, heartbeat, and batch tuning
//!
//! `KEEL_WS_URL`, `KEEL_HTTP_URL`, `KEEL_RPC_URL`, and `KEEL_API_KEY`
//! override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionConfig;

const CONFIG_DIR_NAME: &str = "keel";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable names.
pub mod vars {
    pub const KEEL_WS_URL: &str = "KEEL_WS_URL";
    pub const KEEL_HTTP_URL: &str = "KEEL_HTTP_URL";
    pub const KEEL_RPC_URL: &str = "KEEL_RPC_URL";
    pub const KEEL_API_KEY: &str = "KEEL_API_KEY";
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Semantically invalid configuration.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Persistent channel endpoint (`ws://` or `wss://`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    /// Base URL of the pooled request/response transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_url: Option<String>,
    /// Endpoint of the experimental envelope-over-HTTP transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Bearer credential sent by the HTTP transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Deadline for a request on the persistent channel (default: 30000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Fixed timeout for HTTP transports (default: 30000).
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Idle pooled connections kept per host (default: 8).
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    /// Time-to-live of cached reads (default: 60000).
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Maximum number of cached reads (default: 500).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Backoff base delay (default: 1000).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Backoff cap (default: 30000).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Reconnection attempts before giving up (default: 5). 0 = unlimited.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    /// Watchdog period (default: 30000).
    #[serde(default = "default_heartbeat_check_interval_ms")]
    pub heartbeat_check_interval_ms: u64,
    /// Max silence before the channel is declared dead (default: 60000). 0 = disabled.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Maximum sub-requests per batch (default: 100).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_pool_max_idle_per_host() -> usize {
    8
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

fn default_cache_capacity() -> usize {
    500
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

fn default_heartbeat_check_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    60_000
}

fn default_max_batch_size() -> usize {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            ws_url: None,
            http_url: None,
            rpc_url: None,
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_capacity: default_cache_capacity(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            heartbeat_check_interval_ms: default_heartbeat_check_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl ClientConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from the given file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serializes configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Applies `KEEL_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(vars::KEEL_WS_URL) {
            self.ws_url = Some(url);
        }
        if let Some(url) = lookup(vars::KEEL_HTTP_URL) {
            self.http_url = Some(url);
        }
        if let Some(url) = lookup(vars::KEEL_RPC_URL) {
            self.rpc_url = Some(url);
        }
        if let Some(key) = lookup(vars::KEEL_API_KEY) {
            self.api_key = Some(key);
        }
    }

    /// Validates endpoints and bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ws_url.is_none() && self.http_url.is_none() && self.rpc_url.is_none() {
            return Err(ConfigError::Invalid(
                "no transport configured: set ws_url, http_url, or rpc_url".to_string(),
            ));
        }
        if let Some(ref url) = self.ws_url {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::Invalid(format!(
                    "invalid ws_url '{}': must start with ws:// or wss://",
                    url
                )));
            }
        }
        for (field, url) in [("http_url", &self.http_url), ("rpc_url", &self.rpc_url)] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::Invalid(format!(
                        "invalid {} '{}': must start with http:// or https://",
                        field, url
                    )));
                }
            }
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 || self.http_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Persistent channel settings, if a channel endpoint is configured.
    pub fn connection(&self) -> Option<ConnectionConfig> {
        self.ws_url.as_ref().map(|url| ConnectionConfig {
            url: url.clone(),
            max_attempts: self.reconnect_max_attempts,
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            heartbeat_check_interval: Duration::from_millis(self.heartbeat_check_interval_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            fail_fast: self.http_url.is_some() || self.rpc_url.is_some(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
