// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    upper = { "GET", Method::Get },
    lower = { "post", Method::Post },
    mixed = { "Delete", Method::Delete },
)]
fn method_from_str(input: &str, expected: Method) {
    assert_eq!(input.parse::<Method>().unwrap(), expected);
}

#[test]
fn method_from_str_rejects_unknown() {
    let err = "PATCH".parse::<Method>().unwrap_err();
    assert!(matches!(err, Error::InvalidMethod(m) if m == "PATCH"));
}

#[test]
fn method_serde_is_upper_case() {
    assert_eq!(serde_json::to_string(&Method::Delete).unwrap(), "\"DELETE\"");
}

#[parameterized(
    get = { "get", Method::Get },
    list = { "list", Method::Get },
    find_via_post = { "find", Method::Post },
    count = { "count", Method::Get },
    padded_upper = { "  GET ", Method::Get },
    unknown_get = { "stats", Method::Get },
)]
fn read_commands(command: &str, method: Method) {
    let request = Request::new(command, json!({}), method);
    assert!(matches!(request.access(), Access::Read { .. }));
    assert!(request.is_read());
}

#[test]
fn read_is_tagged_with_key() {
    let request = Request::get("get", json!({"name": "k"}));
    assert_eq!(
        request.access(),
        Access::Read {
            key: Some("k".to_string())
        }
    );
}

#[test]
fn key_falls_back_to_key_field() {
    let request = Request::get("get", json!({"key": "other"}));
    assert_eq!(request.key(), Some("other"));
}

#[parameterized(
    set = { "set" },
    delete = { "delete" },
    increment = { "increment" },
)]
fn keyed_writes_with_name(command: &str) {
    let request = Request::post(command, json!({"name": "k", "value": 1}));
    assert_eq!(
        request.access(),
        Access::Write(WriteScope::Key("k".to_string()))
    );
}

#[test]
fn keyed_write_without_key_is_collection_scoped() {
    let request = Request::post("set", json!({"value": 1}));
    assert_eq!(request.access(), Access::Write(WriteScope::Collection));
}

#[parameterized(
    add = { "add", Method::Post },
    update = { "update", Method::Post },
    remove = { "remove", Method::Delete },
    clear = { "clear", Method::Delete },
    unknown_post = { "upload", Method::Post },
    unknown_delete = { "purge", Method::Delete },
)]
fn collection_writes(command: &str, method: Method) {
    let request = Request::new(command, json!({"name": "k"}), method);
    assert_eq!(request.access(), Access::Write(WriteScope::Collection));
    assert!(!request.is_read());
}

#[test]
fn batch_classifies_each_sub_request() {
    let request = Request::post(
        "batch",
        json!({"requests": [
            {"command": "get", "body": {"name": "a"}},
            {"command": "set", "body": {"name": "b", "value": 2}, "method": "POST"},
            {"command": "clear", "method": "DELETE"}
        ]}),
    );
    assert_eq!(
        request.access(),
        Access::Batch(vec![
            Access::Read {
                key: Some("a".to_string())
            },
            Access::Write(WriteScope::Key("b".to_string())),
            Access::Write(WriteScope::Collection),
        ])
    );
}

#[test]
fn malformed_batch_is_collection_write() {
    let request = Request::post("batch", json!({"requests": "nope"}));
    assert_eq!(request.access(), Access::Write(WriteScope::Collection));
}

#[test]
fn batch_requests_requires_array() {
    assert!(matches!(
        batch_requests(&json!({})),
        Err(Error::InvalidBatch(_))
    ));
    assert!(matches!(
        batch_requests(&json!({"requests": {}})),
        Err(Error::InvalidBatch(_))
    ));
}
