// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use kl_core::Method;
use serde_json::json;
use std::sync::atomic::AtomicUsize;
use tokio::sync::oneshot;

fn fp(name: &str) -> Fingerprint {
    Fingerprint::of("get", Method::Get, &json!({ "name": name }))
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_operation() {
    let in_flight: InFlight<Result<u32, String>> = InFlight::new();
    let started = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel::<()>();
    let mut gate = Some(gate);

    let mut ops = Vec::new();
    for _ in 0..5 {
        let started = Arc::clone(&started);
        let (op, _) = in_flight.join_or_start(fp("k"), || {
            let gate = gate.take().unwrap();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _ = gate.await;
                Ok(42)
            }
        });
        ops.push(tokio::spawn(op));
    }

    assert_eq!(in_flight.len(), 1);
    release.send(()).unwrap();

    for op in ops {
        assert_eq!(op.await.unwrap(), Ok(42));
    }
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn attached_callers_share_the_error() {
    let in_flight: InFlight<Result<u32, String>> = InFlight::new();
    let (first, joined_first) = in_flight.join_or_start(fp("k"), || async {
        tokio::task::yield_now().await;
        Err("boom".to_string())
    });
    let (second, joined_second) = in_flight.join_or_start(fp("k"), || async {
        Err::<u32, String>("second operation started".to_string())
    });

    assert!(!joined_first);
    assert!(joined_second);
    let (a, b) = tokio::join!(first, second);
    assert_eq!(a, Err("boom".to_string()));
    assert_eq!(b, a);
}

#[tokio::test]
async fn entry_is_removed_before_callers_see_the_result() {
    let in_flight: InFlight<u32> = InFlight::new();
    let (op, _) = in_flight.join_or_start(fp("k"), || async { 1 });

    assert!(in_flight.contains(&fp("k")));
    assert_eq!(op.await, 1);
    assert!(in_flight.is_empty());

    let (next, joined) = in_flight.join_or_start(fp("k"), || async { 2 });
    assert!(!joined);
    assert_eq!(next.await, 2);
}

#[tokio::test]
async fn different_fingerprints_do_not_share() {
    let in_flight: InFlight<u32> = InFlight::new();
    let (a, _) = in_flight.join_or_start(fp("a"), || async { 1 });
    let (b, joined) = in_flight.join_or_start(fp("b"), || async { 2 });

    assert!(!joined);
    assert_eq!(in_flight.len(), 2);
    assert_eq!(tokio::join!(a, b), (1, 2));
}

#[tokio::test]
async fn forget_all_detaches_without_cancelling() {
    let in_flight: InFlight<u32> = InFlight::new();
    let (release, gate) = oneshot::channel::<()>();
    let (old, _) = in_flight.join_or_start(fp("k"), || async move {
        let _ = gate.await;
        1
    });
    let old = tokio::spawn(old);

    assert_eq!(in_flight.forget_all(), 1);

    let (fresh, joined) = in_flight.join_or_start(fp("k"), || async { 2 });
    assert!(!joined);

    release.send(()).unwrap();
    assert_eq!(old.await.unwrap(), 1);
    // The detached operation must not remove its replacement.
    assert!(in_flight.contains(&fp("k")));
    assert_eq!(fresh.await, 2);
    assert!(in_flight.is_empty());
}
