// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    timeout = { ClientError::Timeout(Duration::from_millis(1500)), "1500ms" },
    application_with_status = { ClientError::application(Some(404), "no such key"), "remote error (404): no such key" },
    application_without_status = { ClientError::application(None, "denied"), "remote error: denied" },
    batch_too_large = { ClientError::BatchTooLarge { len: 120, max: 100 }, "120" },
    exhausted = { ClientError::Transport(TransportError::ReconnectExhausted { attempts: 5 }), "5 attempts" },
)]
fn error_display_contains(err: ClientError, expected: &str) {
    assert!(
        err.to_string().contains(expected),
        "'{}' should contain '{}'",
        err,
        expected
    );
}

#[test]
fn transports_exhausted_lists_each_failure() {
    let err = ClientError::TransportsExhausted(vec![
        TransportFailure {
            kind: TransportKind::Channel,
            error: TransportError::ConnectionClosed,
        },
        TransportFailure {
            kind: TransportKind::Http,
            error: TransportError::Unavailable { status: 503 },
        },
    ]);
    let msg = err.to_string();
    assert!(msg.contains("channel: connection closed"));
    assert!(msg.contains("http: service unavailable (status 503)"));
}

#[parameterized(
    transport = { ClientError::Transport(TransportError::ConnectionClosed), true },
    timeout = { ClientError::Timeout(Duration::from_secs(1)), false },
    application = { ClientError::application(Some(500), "boom"), false },
    protocol = { ClientError::Protocol("bad".into()), false },
    exhausted = { ClientError::TransportsExhausted(Vec::new()), false },
)]
fn only_transport_errors_fall_through(err: ClientError, expected: bool) {
    assert_eq!(err.is_transport(), expected);
}

#[test]
fn transport_error_converts() {
    let err: ClientError = TransportError::SendFailed("broken pipe".into()).into();
    assert!(matches!(err, ClientError::Transport(TransportError::SendFailed(_))));
}
