//! # Node API
//!
//! HTTP surface of one node: the status document peers poll, a routing
//! preview, accelerator telemetry, and the chat relay that executes locally
//! or forwards to a friendly server.
//!
//! ## Endpoints
//!
//! - `GET /api/cluster/status` - This node's cluster status
//! - `GET /api/cluster/route?model=` - Routing verdict with its trace
//! - `GET /api/gpus` - Reachable instances and accelerator metrics
//! - `POST /api/chat` - Chat relay
//! - `GET /health` - Liveness
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Example
//!
//! ```no_run
//! use ollamify::api::{create_router, AppState};
//! use ollamify::config::OllamifyConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(OllamifyConfig::default());
//! let state = Arc::new(AppState::new(config)?);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Relay failures use one envelope:
//! ```json
//! {
//!   "error": {
//!     "message": "friendly server timed out after 600000ms",
//!     "type": "server_error",
//!     "code": "gateway_timeout"
//!   }
//! }
//! ```

mod chat;
mod cluster;
pub mod headers;
mod health;
pub mod types;

pub use types::*;

use crate::clock::{self, Clock};
use crate::cluster::{peer_client, ClusterAggregator, ServerIdentity};
use crate::config::{server::local_hostname, OllamifyConfig};
use crate::forward::ForwardingProxy;
use crate::friendly::{FriendlyServerSource, StaticFriendlyServers};
use crate::inflight::InFlightTracker;
use crate::instances::InstanceDirectory;
use crate::metrics::MetricsCollector;
use crate::routing::RoutingEngine;
use crate::telemetry::GpuMetricsCollector;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (100 MB).
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: Arc<OllamifyConfig>,
    pub engine: Arc<RoutingEngine>,
    pub proxy: ForwardingProxy,
    /// Client for local instance calls
    pub http_client: reqwest::Client,
    /// Server startup time for uptime tracking
    pub start_time: Instant,
    pub metrics_collector: Arc<MetricsCollector>,
}

impl AppState {
    /// State with the configured friendly servers and the system clock.
    pub fn new(config: Arc<OllamifyConfig>) -> Result<Self, reqwest::Error> {
        let friends = Arc::new(StaticFriendlyServers::new(config.friendly_servers.clone()));
        Self::with_components(config, friends, clock::system())
    }

    /// State with an explicit peer source and clock.
    pub fn with_components(
        config: Arc<OllamifyConfig>,
        friends: Arc<dyn FriendlyServerSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()?;
        let peer_client = peer_client(config.routing.insecure_tls)?;

        let identity = ServerIdentity {
            id: config.node.resolve_id(),
            hostname: local_hostname(),
        };

        let instances = Arc::new(InstanceDirectory::new(
            config.instances.clone(),
            http_client.clone(),
            Arc::clone(&clock),
        ));
        let telemetry = Arc::new(GpuMetricsCollector::new(
            config.telemetry.clone(),
            http_client.clone(),
            Arc::clone(&clock),
        ));
        let inflight = Arc::new(InFlightTracker::new());

        let proxy = ForwardingProxy::new(
            peer_client.clone(),
            identity.id.clone(),
            config.routing.forward_timeout(),
        );
        let aggregator = Arc::new(ClusterAggregator::new(
            instances,
            telemetry,
            Arc::clone(&inflight),
            identity,
            config.routing.clone(),
            peer_client,
            Arc::clone(&clock),
        ));
        let engine = Arc::new(RoutingEngine::new(
            aggregator,
            friends,
            config.routing.clone(),
            clock,
        ));

        let start_time = Instant::now();
        let metrics_collector = Arc::new(MetricsCollector::new(
            inflight,
            start_time,
            crate::metrics::handle_or_detached(),
        ));

        Ok(Self {
            config,
            engine,
            proxy,
            http_client,
            start_time,
            metrics_collector,
        })
    }

    /// Timeout for local instance calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.request_timeout_seconds)
    }
}

/// Create the main API router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/cluster/status", get(cluster::status))
        .route("/api/cluster/route", get(cluster::route))
        .route("/api/gpus", get(cluster::gpus))
        .route("/api/chat", post(chat::handle))
        .route("/health", get(health::handle))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
