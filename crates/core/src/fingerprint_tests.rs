// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn key_order_does_not_matter() {
    let a: Value = serde_json::from_str(r#"{"name":"k","filter":{"x":1,"y":2}}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"filter":{"y":2,"x":1},"name":"k"}"#).unwrap();
    assert_eq!(
        Fingerprint::of("get", Method::Get, &a),
        Fingerprint::of("get", Method::Get, &b)
    );
}

#[test]
fn command_is_normalized() {
    let body = json!({"name": "k"});
    assert_eq!(
        Fingerprint::of(" GET ", Method::Get, &body),
        Fingerprint::of("get", Method::Get, &body)
    );
}

#[test]
fn empty_object_equals_null() {
    assert_eq!(
        Fingerprint::of("list", Method::Get, &json!({})),
        Fingerprint::of("list", Method::Get, &Value::Null)
    );
}

#[parameterized(
    different_command = { "list", Method::Get, json!({"name": "k"}) },
    different_method = { "get", Method::Post, json!({"name": "k"}) },
    different_body = { "get", Method::Get, json!({"name": "j"}) },
    array_body = { "get", Method::Get, json!({"name": ["k"]}) },
)]
fn distinct_requests_differ(command: &str, method: Method, body: Value) {
    let base = Fingerprint::of("get", Method::Get, &json!({"name": "k"}));
    assert_ne!(base, Fingerprint::of(command, method, &body));
}

#[test]
fn array_order_is_significant() {
    assert_ne!(
        Fingerprint::of("find", Method::Get, &json!({"ids": [1, 2]})),
        Fingerprint::of("find", Method::Get, &json!({"ids": [2, 1]}))
    );
}

#[test]
fn format_is_readable_prefix_plus_hash() {
    let fp = Fingerprint::of("Get", Method::Get, &json!({"name": "k"}));
    let parts: Vec<&str> = fp.as_str().split(':').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "GET");
    assert_eq!(parts[1], "get");
    assert_eq!(parts[2].len(), 32);
}
