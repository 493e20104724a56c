// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::transport::build_http_client;
use kl_core::{BatchItem, ControlMessage};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn transport(server: &MockServer) -> RpcTransport {
    let client = build_http_client(TIMEOUT, 4).unwrap();
    RpcTransport::new(
        client,
        format!("{}/rpc", server.uri()),
        Some("secret".into()),
        TIMEOUT,
    )
}

/// Answers each posted envelope the way the relay would.
fn relay(request: &wiremock::Request) -> ResponseTemplate {
    let message = ClientMessage::from_json(std::str::from_utf8(&request.body).unwrap()).unwrap();
    let reply = match message {
        ClientMessage::Request(envelope) if envelope.command == "fail" => {
            ServerMessage::error(envelope.id, "rejected", Some(422), 1)
        }
        ClientMessage::Request(envelope) => {
            ServerMessage::response(envelope.id, json!({"echo": envelope.body}), 1)
        }
        ClientMessage::Control(ControlMessage::Batch { id, requests }) => {
            let items = requests
                .into_iter()
                .map(|r| BatchItem::ok(r.id, json!(r.command)))
                .collect();
            ServerMessage::batch_response(id, items, 1)
        }
        ClientMessage::Control(ControlMessage::Pong { .. }) => ServerMessage::ping(1),
    };
    ResponseTemplate::new(200).set_body_string(reply.to_json().unwrap())
}

#[tokio::test]
async fn request_round_trips_through_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(relay)
        .expect(1)
        .mount(&server)
        .await;

    let result = transport(&server)
        .request(&Request::get("get", json!({"name": "k"})))
        .await;
    assert_eq!(result, Ok(json!({"echo": {"name": "k"}})));
}

#[tokio::test]
async fn error_message_is_an_application_error() {
    let server = MockServer::start().await;
    Mock::given(path("/rpc")).respond_with(relay).mount(&server).await;

    let result = transport(&server)
        .request(&Request::post("fail", json!({})))
        .await;
    assert_eq!(result, Err(ClientError::application(Some(422), "rejected")));
}

#[tokio::test]
async fn response_for_another_id_is_a_protocol_error() {
    let server = MockServer::start().await;
    let stray = ServerMessage::response("someone-else", json!(1), 1);
    Mock::given(path("/rpc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stray.to_json().unwrap()))
        .mount(&server)
        .await;

    let result = transport(&server)
        .request(&Request::get("get", json!({})))
        .await;
    assert!(matches!(result, Err(ClientError::Protocol(_))));
}

#[tokio::test]
async fn heartbeat_only_endpoint_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/rpc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ServerMessage::connected(1).to_json().unwrap()),
        )
        .mount(&server)
        .await;

    let result = transport(&server)
        .request(&Request::get("get", json!({})))
        .await;
    assert!(matches!(
        result,
        Err(ClientError::Transport(TransportError::ReceiveFailed(_)))
    ));
}

#[tokio::test]
async fn unavailable_gateway_falls_through() {
    let server = MockServer::start().await;
    Mock::given(path("/rpc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = transport(&server)
        .request(&Request::get("get", json!({})))
        .await;
    assert_eq!(
        result,
        Err(ClientError::Transport(TransportError::Unavailable { status: 503 }))
    );
}

#[tokio::test]
async fn batch_is_one_envelope() {
    let server = MockServer::start().await;
    Mock::given(path("/rpc"))
        .respond_with(relay)
        .expect(1)
        .mount(&server)
        .await;

    let requests = vec![
        Request::get("get", json!({"name": "a"})),
        Request::get("count", json!({})),
    ];
    let results = transport(&server).batch(&requests).await.unwrap();
    assert_eq!(results, vec![Ok(json!("get")), Ok(json!("count"))]);
}
