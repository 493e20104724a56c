// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::collections::HashMap;
use yare::parameterized;

#[test]
fn defaults_match_documented_values() {
    let config = ClientConfig::default();
    assert_eq!(config.request_timeout_ms, 30_000);
    assert_eq!(config.http_timeout_ms, 30_000);
    assert_eq!(config.cache_ttl_ms, 60_000);
    assert_eq!(config.cache_capacity, 500);
    assert_eq!(config.reconnect_base_delay_ms, 1_000);
    assert_eq!(config.reconnect_max_delay_ms, 30_000);
    assert_eq!(config.reconnect_max_attempts, 5);
    assert_eq!(config.heartbeat_check_interval_ms, 30_000);
    assert_eq!(config.heartbeat_timeout_ms, 60_000);
    assert_eq!(config.max_batch_size, 100);
}

#[test]
fn minimal_toml_fills_defaults() {
    let config = ClientConfig::from_toml_str(r#"ws_url = "ws://localhost:7890""#).unwrap();
    assert_eq!(config.ws_url.as_deref(), Some("ws://localhost:7890"));
    assert_eq!(config.cache_capacity, 500);
    assert!(config.validate().is_ok());
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
http_url = "https://api.example.com/v1"
api_key = "secret"
cache_ttl_ms = 5000
reconnect_max_attempts = 0
"#,
    )
    .unwrap();

    let config = ClientConfig::load(&path).unwrap();
    assert_eq!(config.http_url.as_deref(), Some("https://api.example.com/v1"));
    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    assert_eq!(config.reconnect_max_attempts, 0);
}

#[test]
fn load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClientConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_toml_is_parse_error() {
    let err = ClientConfig::from_toml_str("cache_capacity = \"lots\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn toml_roundtrip_preserves_values() {
    let config = ClientConfig {
        ws_url: Some("wss://example.com/ws".into()),
        max_batch_size: 10,
        ..ClientConfig::default()
    };
    let text = config.to_toml_string().unwrap();
    assert_eq!(ClientConfig::from_toml_str(&text).unwrap(), config);
}

#[parameterized(
    no_transport = { ClientConfig::default() },
    http_ws_url = { ClientConfig { ws_url: Some("http://x".into()), ..ClientConfig::default() } },
    ws_http_url = { ClientConfig { http_url: Some("ws://x".into()), ..ClientConfig::default() } },
    bare_rpc_url = { ClientConfig { rpc_url: Some("example.com".into()), ..ClientConfig::default() } },
    zero_capacity = { ClientConfig { http_url: Some("http://x".into()), cache_capacity: 0, ..ClientConfig::default() } },
    zero_batch = { ClientConfig { http_url: Some("http://x".into()), max_batch_size: 0, ..ClientConfig::default() } },
    zero_timeout = { ClientConfig { http_url: Some("http://x".into()), request_timeout_ms: 0, ..ClientConfig::default() } },
)]
fn validate_rejects(config: ClientConfig) {
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn env_overrides_replace_file_values() {
    let mut config = ClientConfig {
        http_url: Some("http://file".into()),
        ..ClientConfig::default()
    };
    let env: HashMap<&str, &str> = [
        (vars::KEEL_HTTP_URL, "http://env"),
        (vars::KEEL_API_KEY, "token"),
    ]
    .into_iter()
    .collect();

    config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

    assert_eq!(config.http_url.as_deref(), Some("http://env"));
    assert_eq!(config.api_key.as_deref(), Some("token"));
    assert_eq!(config.ws_url, None);
}

#[test]
fn connection_config_only_with_ws_url() {
    assert!(ClientConfig::default().connection().is_none());

    let config = ClientConfig {
        ws_url: Some("ws://localhost:7890".into()),
        reconnect_base_delay_ms: 250,
        heartbeat_timeout_ms: 0,
        ..ClientConfig::default()
    };
    let connection = config.connection().unwrap();
    assert_eq!(connection.url, "ws://localhost:7890");
    assert_eq!(connection.base_delay, Duration::from_millis(250));
    assert_eq!(connection.max_attempts, 5);
    assert_eq!(connection.heartbeat_timeout, Duration::ZERO);
    assert!(!connection.fail_fast);

    let with_fallback = ClientConfig {
        http_url: Some("http://localhost:8080".into()),
        ..config
    };
    assert!(with_fallback.connection().unwrap().fail_fast);
}
