//! Unit tests for the cluster aggregator.

use super::*;
use crate::api::headers::{FORWARDED_BY, NO_FORWARD};
use crate::clock::ManualClock;
use crate::config::{InstancesConfig, TelemetryConfig};
use crate::inflight::InFlightKey;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn aggregator(ollama: &str, telemetry: &str, clock: &ManualClock) -> ClusterAggregator {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let instances = InstanceDirectory::new(
        InstancesConfig {
            primary_url: ollama.to_string(),
            secondary_urls: vec![],
            ..InstancesConfig::default()
        },
        reqwest::Client::new(),
        Arc::clone(&clock),
    );
    let telemetry = GpuMetricsCollector::new(
        TelemetryConfig {
            url: telemetry.to_string(),
            timeout_ms: 300,
            ..TelemetryConfig::default()
        },
        reqwest::Client::new(),
        Arc::clone(&clock),
    );
    ClusterAggregator::new(
        Arc::new(instances),
        Arc::new(telemetry),
        Arc::new(InFlightTracker::new()),
        ServerIdentity {
            id: "node-1".to_string(),
            hostname: "host-1".to_string(),
        },
        RoutingConfig::default(),
        reqwest::Client::new(),
        clock,
    )
}

fn peer(base_url: &str) -> FriendlyServer {
    FriendlyServer {
        id: "peer-a".to_string(),
        name: "Peer A".to_string(),
        base_url: base_url.to_string(),
        username: None,
        api_key: "peer-key".to_string(),
        enabled: true,
    }
}

async fn mount_local_instance(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:8b", "size": 10}, {"name": "phi3", "size": 5}]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:8b", "model": "llama3:8b"}]
        })))
        .mount(server)
        .await;
}

async fn mount_gpus(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/gpus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gpus": [{"index": 0, "utilization_gpu_percent": 40, "memory_used_mb": 1024, "memory_total_mb": 4096}]
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Local status
// ============================================================================

#[tokio::test]
async fn test_local_status_composes_sources() {
    let ollama = MockServer::start().await;
    let sidecar = MockServer::start().await;
    mount_local_instance(&ollama).await;
    mount_gpus(&sidecar).await;

    let clock = ManualClock::new(5_000);
    let aggregator = aggregator(&ollama.uri(), &sidecar.uri(), &clock);
    let _guard = aggregator
        .inflight()
        .begin(InFlightKey::new(Some(0), Some("llama3:8b")));

    let status = aggregator.local_status(false).await;

    assert_eq!(status.server.id, "node-1");
    assert_eq!(status.updated_at, 5_000);
    assert_eq!(status.instances.len(), 1);
    assert!(status.metrics_available);
    assert_eq!(status.gpus.len(), 1);
    assert_eq!(status.models.installed.len(), 2);
    assert_eq!(status.models.installed[0].gpu_label.as_deref(), Some("GPU 0"));
    assert_eq!(status.models.loaded.len(), 1);
    assert_eq!(status.load.in_flight_total, 1);
    assert_eq!(status.load.in_flight_by_instance.get("0"), Some(&1));
    assert!(status.remote.is_none());

    let placement = model_placement(Some(&status), Some("llama3:8b"));
    assert!(placement.loaded);
    assert_eq!(placement.in_flight, 1);
    assert_eq!(placement.gpu_util_percent, Some(40.0));
    assert_eq!(placement.vram_util_percent, Some(25.0));
}

#[tokio::test]
async fn test_local_status_ttl() {
    let ollama = MockServer::start().await;
    let sidecar = MockServer::start().await;
    mount_local_instance(&ollama).await;
    mount_gpus(&sidecar).await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator(&ollama.uri(), &sidecar.uri(), &clock);

    // Given a computed status
    let first = aggregator.local_status(false).await;

    // When asked again within 1.5s
    clock.advance_ms(1_499);
    let second = aggregator.local_status(false).await;

    // Then the same document is returned
    assert!(Arc::ptr_eq(&first, &second));

    // And after the TTL it is recomputed
    clock.advance_ms(1);
    let third = aggregator.local_status(false).await;
    assert_eq!(third.updated_at, 1_500);
    assert_ne!(first.updated_at, third.updated_at);
}

#[tokio::test]
async fn test_local_status_force_recomputes() {
    let ollama = MockServer::start().await;
    let sidecar = MockServer::start().await;
    mount_local_instance(&ollama).await;
    mount_gpus(&sidecar).await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator(&ollama.uri(), &sidecar.uri(), &clock);

    let first = aggregator.local_status(false).await;
    let forced = aggregator.local_status(true).await;
    assert!(!Arc::ptr_eq(&first, &forced));
}

#[tokio::test]
async fn test_local_status_tolerates_failing_sources() {
    // Given an instance whose loaded listing fails and no telemetry
    let ollama = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "phi3"}]})))
        .mount(&ollama)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ps"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&ollama)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator(&ollama.uri(), "http://127.0.0.1:1", &clock);

    // When the status is computed
    let status = aggregator.local_status(false).await;

    // Then it still succeeds with zero loaded models and no metrics
    assert_eq!(status.models.installed.len(), 1);
    assert!(status.models.loaded.is_empty());
    assert!(!status.metrics_available);
    assert!(status.gpus.is_empty());
}

// ============================================================================
// Remote status
// ============================================================================

#[tokio::test]
async fn test_remote_status_annotated_and_authenticated() {
    let peer_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .and(header("authorization", "Bearer peer-key"))
        .and(header(NO_FORWARD, "1"))
        .and(header(FORWARDED_BY, "node-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "server": {"id": "peer-a", "hostname": "peer-host"},
            "updatedAt": 1,
            "models": {"installed": [{"name": "llama3:8b", "gpu": 0}], "loaded": []}
        })))
        .expect(1)
        .mount(&peer_server)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);

    let status = aggregator
        .remote_status(&peer(&peer_server.uri()), RemoteFetchOptions::default())
        .await
        .unwrap();

    let remote = status.remote.as_ref().unwrap();
    assert_eq!(remote.id.as_deref(), Some("peer-a"));
    assert_eq!(remote.name.as_deref(), Some("Peer A"));
    assert_eq!(remote.base_url, peer_server.uri());
    assert!(model_placement(Some(&status), Some("llama3:8b")).installed);

    // Annotation is serialized under `_remote`
    let value = serde_json::to_value(status.as_ref()).unwrap();
    assert_eq!(value["_remote"]["base_url"], peer_server.uri());
}

#[tokio::test]
async fn test_remote_status_cached_within_ttl() {
    let peer_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedAt": 1})))
        .expect(2)
        .mount(&peer_server)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);
    let server = peer(&peer_server.uri());

    let first = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await
        .unwrap();
    clock.advance_ms(1_000);
    let second = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    clock.advance_ms(500);
    let third = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[tokio::test]
async fn test_remote_failure_cached_within_ttl() {
    // Given a peer rejecting the credential
    let peer_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&peer_server)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);
    let server = peer(&peer_server.uri());

    // When fetched twice within the TTL
    let first = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await;
    let second = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await;

    // Then both fail with the same cached error and the peer is hit once
    let expected = PeerError::Http {
        status: 401,
        body: "bad key".to_string(),
    };
    assert_eq!(first.unwrap_err(), expected);
    assert_eq!(second.unwrap_err(), expected);
}

#[tokio::test]
async fn test_remote_timeout_override() {
    let peer_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&peer_server)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);

    let result = aggregator
        .remote_status(
            &peer(&peer_server.uri()),
            RemoteFetchOptions {
                timeout: Some(Duration::from_millis(50)),
                force: true,
            },
        )
        .await;
    assert_eq!(result.unwrap_err(), PeerError::Timeout(50));
}

#[tokio::test]
async fn test_remote_requires_credentials() {
    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);
    let mut server = peer("http://peer");
    server.api_key = String::new();

    let result = aggregator
        .remote_status(&server, RemoteFetchOptions::default())
        .await;
    assert!(matches!(result, Err(PeerError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_remote_invalid_json_is_parse_error() {
    let peer_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cluster/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&peer_server)
        .await;

    let clock = ManualClock::new(0);
    let aggregator = aggregator("http://127.0.0.1:1", "http://127.0.0.1:1", &clock);

    let result = aggregator
        .remote_status(&peer(&peer_server.uri()), RemoteFetchOptions::default())
        .await;
    assert!(matches!(result, Err(PeerError::Parse(_))));
}
