//! Shared test utilities for Ollamify integration tests.
//!
//! Mock servers stand in for local Ollama instances, the accelerator
//! telemetry sidecar, and friendly peer nodes.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use ollamify::api::{create_router, AppState};
use ollamify::config::{FriendlyServerConfig, OllamifyConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MODEL: &str = "llama3:8b";
pub const NODE_ID: &str = "node-a";
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

// =============================================================================
// Mock servers
// =============================================================================

/// Local Ollama instance listing `installed` and `loaded`, answering chat.
pub async fn mock_ollama(installed: &[&str], loaded: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let installed: Vec<_> = installed
        .iter()
        .map(|m| json!({"name": m, "size": 4_000_000_000u64}))
        .collect();
    let loaded: Vec<_> = loaded
        .iter()
        .map(|m| json!({"name": m, "model": m}))
        .collect();

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.5.0"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": installed })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": loaded })))
        .mount(&server)
        .await;
    server
}

/// Mount a streaming chat answer on `server`.
pub async fn mount_chat(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body.to_string(), "application/x-ndjson"),
        )
        .mount(server)
        .await;
}

/// Telemetry sidecar reporting one accelerator.
pub async fn mock_gpu_info(util: f64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gpus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gpus": [{
                "index": 0,
                "name": "RTX 4090",
                "utilization_gpu_percent": util,
                "memory_used_mb": 6000,
                "memory_total_mb": 24000
            }]
        })))
        .mount(&server)
        .await;
    server
}

/// Peer node with `MODEL` resident and idle.
pub async fn mock_idle_peer() -> MockServer {
    let server = MockServer::start().await;
    let entry = json!({"name": MODEL, "model": MODEL, "gpu": 0});
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server": {"id": "peer-b", "hostname": "peer-b"},
            "updatedAt": 1,
            "instances": [{"id": 0, "name": "GPU 0", "baseUrl": "http://ollama:11434"}],
            "gpus": [{"index": 0, "utilization_gpu_percent": 0}],
            "metricsAvailable": true,
            "load": {"in_flight_total": 0, "in_flight_by_instance": {}, "in_flight_by_model": {}},
            "models": {"installed": [entry.clone()], "loaded": [entry]}
        })))
        .mount(&server)
        .await;
    server
}

// =============================================================================
// App construction
// =============================================================================

/// Config pointing at the given mocks, no secondary instance.
pub fn test_config(ollama: &str, gpu_info: &str) -> OllamifyConfig {
    let mut config = OllamifyConfig::default();
    config.node.id = Some(NODE_ID.to_string());
    config.instances.primary_url = ollama.to_string();
    config.instances.secondary_urls = vec![];
    config.telemetry.url = gpu_info.to_string();
    config.telemetry.timeout_ms = 500;
    config.routing.peer_status_timeout_ms = 1000;
    config
}

pub fn friendly(id: &str, base_url: &str) -> FriendlyServerConfig {
    FriendlyServerConfig {
        id: Some(id.to_string()),
        name: id.to_string(),
        base_url: base_url.to_string(),
        username: None,
        api_key: Some(format!("{}-key", id)),
        api_key_env: None,
        enabled: true,
    }
}

pub fn build_app(config: OllamifyConfig) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Arc::new(config)).unwrap());
    (create_router(Arc::clone(&state)), state)
}

// =============================================================================
// Request helpers
// =============================================================================

pub async fn get(app: &axum::Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: &Value,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

pub fn chat_body(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "hello"}],
        "stream": true
    })
}
