//! End-to-end tests for the chat relay: local execution, forwarding to a
//! friendly server, and loop prevention.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use wiremock::matchers::{body_json as body_matches, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const STREAM: &str = "{\"message\":{\"content\":\"hi\"},\"done\":false}\n{\"done\":true}\n";

// ============================================================================
// Local execution
// ============================================================================

#[tokio::test]
async fn test_warm_local_model_executes_locally() {
    // Given the model resident on an idle local GPU
    let ollama = mock_ollama(&[MODEL], &[MODEL]).await;
    mount_chat(&ollama, STREAM).await;
    let gpus = mock_gpu_info(5.0).await;
    let (app, state) = build_app(test_config(&ollama.uri(), &gpus.uri()));

    // When
    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    // Then the instance's stream is relayed with provenance
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers.get("x-ollamify-executed-on").unwrap(), "local:0");
    assert_eq!(
        headers.get("x-ollamify-route-reason").unwrap(),
        "local_warm_and_free"
    );
    assert_eq!(headers.get("content-type").unwrap(), "application/x-ndjson");
    assert_eq!(headers.get("x-request-id").unwrap().len(), 36);
    assert!(headers.get("x-ollamify-forwarded-by").is_none());
    assert_eq!(body_text(response).await, STREAM);

    // And the in-flight count returned to zero once the body ended
    let inflight = state.engine.aggregator().inflight().snapshot();
    assert_eq!(inflight.total, 0);
    assert!(inflight.by_model.is_empty());
}

#[tokio::test]
async fn test_local_body_is_replayed_verbatim() {
    let ollama = mock_ollama(&[MODEL], &[MODEL]).await;
    let body = json!({"model": MODEL, "messages": [], "options": {"temperature": 0.2}});
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_matches(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .expect(1)
        .mount(&ollama)
        .await;
    let (app, _) = build_app(test_config(&ollama.uri(), UNREACHABLE));

    let response = post_json(&app, "/api/chat", &body, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_local_instance_down_is_bad_gateway() {
    let (app, state) = build_app(test_config(UNREACHABLE, UNREACHABLE));

    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "bad_gateway");
    assert_eq!(state.engine.aggregator().inflight().snapshot().total, 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let (app, _) = build_app(test_config(UNREACHABLE, UNREACHABLE));

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "invalid_request_error");
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_cold_local_forwards_to_idle_peer() {
    // Given a cold local model and an idle peer with it resident
    let ollama = mock_ollama(&[MODEL], &[]).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ollama)
        .await;
    let gpus = mock_gpu_info(10.0).await;
    let peer = mock_idle_peer().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("authorization", "Bearer peer-b-key"))
        .and(header("x-ollamify-no-forward", "1"))
        .and(header("x-ollamify-forwarded-by", NODE_ID))
        .and(body_matches(chat_body(MODEL)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(STREAM, "application/x-ndjson"),
        )
        .expect(1)
        .mount(&peer)
        .await;

    let mut config = test_config(&ollama.uri(), &gpus.uri());
    config.friendly_servers = vec![friendly("peer-b", &peer.uri())];
    let (app, _) = build_app(config);

    // When
    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    // Then
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(
        headers.get("x-ollamify-executed-on").unwrap(),
        "friendly:peer-b"
    );
    assert_eq!(headers.get("x-ollamify-forwarded-by").unwrap(), NODE_ID);
    assert_eq!(
        headers.get("x-ollamify-route-reason").unwrap(),
        "friendly_better"
    );
    assert_eq!(body_text(response).await, STREAM);
}

#[tokio::test]
async fn test_forwarded_request_counts_in_flight_until_body_ends() {
    // Given a cold local model and an idle peer with it resident
    let ollama = mock_ollama(&[MODEL], &[]).await;
    let gpus = mock_gpu_info(10.0).await;
    let peer = mock_idle_peer().await;
    mount_chat(&peer, STREAM).await;

    let mut config = test_config(&ollama.uri(), &gpus.uri());
    config.friendly_servers = vec![friendly("peer-b", &peer.uri())];
    let (app, state) = build_app(config);

    // When the peer has answered but the body is still unread
    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;
    assert_eq!(
        response.headers().get("x-ollamify-executed-on").unwrap(),
        "friendly:peer-b"
    );

    // Then the relay is counted against the model only
    let during = state.engine.aggregator().inflight().snapshot();
    assert_eq!(during.by_model.get(MODEL), Some(&1));
    assert!(during.by_instance.is_empty());

    // And released once the body has been relayed
    assert_eq!(body_text(response).await, STREAM);
    let after = state.engine.aggregator().inflight().snapshot();
    assert!(after.by_model.is_empty());
}

#[tokio::test]
async fn test_no_forward_request_stays_local() {
    // Given a peer that would otherwise win
    let ollama = mock_ollama(&[MODEL], &[]).await;
    mount_chat(&ollama, STREAM).await;
    let peer = mock_idle_peer().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&peer)
        .await;
    let mut config = test_config(&ollama.uri(), UNREACHABLE);
    config.friendly_servers = vec![friendly("peer-b", &peer.uri())];
    let (app, _) = build_app(config);

    // When the request was already forwarded once
    let response = post_json(
        &app,
        "/api/chat",
        &chat_body(MODEL),
        &[("x-ollamify-no-forward", "true")],
    )
    .await;

    // Then it executes here
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-ollamify-executed-on").unwrap(),
        "local:0"
    );
    assert_eq!(
        response.headers().get("x-ollamify-route-reason").unwrap(),
        "no_forward_header"
    );
}

#[tokio::test]
async fn test_unreachable_peer_falls_back_to_local() {
    let ollama = mock_ollama(&[MODEL], &[]).await;
    mount_chat(&ollama, STREAM).await;
    let mut config = test_config(&ollama.uri(), UNREACHABLE);
    config.friendly_servers = vec![friendly("gone", UNREACHABLE)];
    let (app, _) = build_app(config);

    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-ollamify-route-reason").unwrap(),
        "local_default"
    );
}

#[tokio::test]
async fn test_peer_error_status_is_propagated() {
    let ollama = mock_ollama(&[MODEL], &[]).await;
    let peer = mock_idle_peer().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "out of memory"})),
        )
        .mount(&peer)
        .await;
    let mut config = test_config(&ollama.uri(), UNREACHABLE);
    config.friendly_servers = vec![friendly("peer-b", &peer.uri())];
    let (app, _) = build_app(config);

    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("out of memory"));
}

#[tokio::test]
async fn test_model_on_secondary_instance_runs_there() {
    // Given the model only on the second instance
    let primary = mock_ollama(&["mistral:7b"], &[]).await;
    let secondary = mock_ollama(&[MODEL], &[MODEL]).await;
    mount_chat(&secondary, STREAM).await;
    let mut config = test_config(&primary.uri(), UNREACHABLE);
    config.instances.secondary_urls = vec![secondary.uri()];
    let (app, _) = build_app(config);

    let response = post_json(&app, "/api/chat", &chat_body(MODEL), &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-ollamify-executed-on").unwrap(),
        "local:1"
    );
}
