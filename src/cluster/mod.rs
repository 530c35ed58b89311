//! Cluster status aggregation.
//!
//! Composes the instance directory, accelerator metrics and in-flight
//! counters into one [`ClusterStatus`] for this node, and fetches the same
//! document from friendly servers. Both sides are cached with short TTLs;
//! peer failures are cached too so a down peer is not retried within the
//! window.

mod error;
mod placement;
mod status;

pub use error::PeerError;
pub use placement::{model_placement, ModelPlacement};
pub use status::{ClusterStatus, LoadInfo, ModelsInfo, RemoteInfo, ServerIdentity};

use crate::api::headers::peer_request_headers;
use crate::cache::{CacheEntry, TtlCache};
use crate::clock::Clock;
use crate::config::RoutingConfig;
use crate::friendly::FriendlyServer;
use crate::inflight::InFlightTracker;
use crate::instances::InstanceDirectory;
use crate::telemetry::GpuMetricsCollector;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for a single peer status fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteFetchOptions {
    /// Overrides the configured peer status timeout
    pub timeout: Option<Duration>,
    /// Bypass the per-peer cache
    pub force: bool,
}

type RemoteResult = Result<Arc<ClusterStatus>, PeerError>;

/// Build the HTTP client used for peer calls.
///
/// With `insecure_tls` the client accepts self-signed certificates.
pub fn peer_client(insecure_tls: bool) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(insecure_tls)
        .build()
}

/// Local and remote cluster status with TTL caching.
pub struct ClusterAggregator {
    instances: Arc<InstanceDirectory>,
    telemetry: Arc<GpuMetricsCollector>,
    inflight: Arc<InFlightTracker>,
    identity: ServerIdentity,
    config: RoutingConfig,
    peer_client: reqwest::Client,
    clock: Arc<dyn Clock>,
    local: TtlCache<Arc<ClusterStatus>>,
    remote: DashMap<String, CacheEntry<RemoteResult>>,
}

impl ClusterAggregator {
    pub fn new(
        instances: Arc<InstanceDirectory>,
        telemetry: Arc<GpuMetricsCollector>,
        inflight: Arc<InFlightTracker>,
        identity: ServerIdentity,
        config: RoutingConfig,
        peer_client: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let local = TtlCache::new(config.local_status_ttl());
        Self {
            instances,
            telemetry,
            inflight,
            identity,
            config,
            peer_client,
            clock,
            local,
            remote: DashMap::new(),
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn inflight(&self) -> &Arc<InFlightTracker> {
        &self.inflight
    }

    pub fn instances(&self) -> &Arc<InstanceDirectory> {
        &self.instances
    }

    pub fn telemetry(&self) -> &Arc<GpuMetricsCollector> {
        &self.telemetry
    }

    /// This node's status, recomputed when older than the local TTL.
    pub async fn local_status(&self, force: bool) -> Arc<ClusterStatus> {
        let now = self.clock.now_ms();
        if !force {
            if let Some(status) = self.local.get_fresh(now) {
                return status;
            }
        }

        let (gpu_metrics, index) = tokio::join!(
            self.telemetry.get_gpu_metrics(),
            self.instances.refresh_model_index(true)
        );

        let mut loaded = Vec::new();
        for result in self.instances.fetch_loaded_models(&index.instances).await {
            match result.outcome {
                Ok(models) => loaded.extend(models),
                Err(error) => tracing::warn!(
                    instance_id = result.instance.id,
                    base_url = %result.instance.base_url,
                    error = %error,
                    "Failed to fetch loaded models"
                ),
            }
        }

        let status = Arc::new(ClusterStatus {
            server: self.identity.clone(),
            updated_at: now,
            instances: index.instances.clone(),
            gpus: gpu_metrics.gpus,
            metrics_available: gpu_metrics.metrics_available,
            metrics_stale: gpu_metrics.metrics_stale,
            metrics_updated_at: gpu_metrics.metrics_updated_at,
            load: self.inflight.snapshot().into(),
            models: ModelsInfo {
                installed: index.installed(),
                loaded,
            },
            remote: None,
        });

        self.local.insert(Arc::clone(&status), now);
        status
    }

    /// A friendly server's status annotated with `_remote`.
    ///
    /// Successes and failures are both cached per peer for the remote TTL.
    pub async fn remote_status(
        &self,
        server: &FriendlyServer,
        options: RemoteFetchOptions,
    ) -> RemoteResult {
        if server.base_url.trim().is_empty() || server.api_key.trim().is_empty() {
            return Err(PeerError::InvalidConfig(
                "base_url and api_key are required".to_string(),
            ));
        }

        let key = server.cache_key().to_string();
        let now = self.clock.now_ms();
        if !options.force {
            if let Some(entry) = self.remote.get(&key) {
                if entry.is_fresh(now, self.config.remote_status_ttl_ms) {
                    return entry.value.clone();
                }
            }
        }

        let result = self
            .fetch_remote(server, options.timeout.unwrap_or(self.config.peer_status_timeout()))
            .await;

        if let Err(error) = &result {
            metrics::counter!("ollamify_peer_status_failures_total", "server" => key.clone())
                .increment(1);
            tracing::warn!(server = %server.name, error = %error, "Friendly server status failed");
        }

        self.remote.insert(
            key,
            CacheEntry {
                value: result.clone(),
                updated_at_ms: now,
            },
        );
        result
    }

    async fn fetch_remote(&self, server: &FriendlyServer, timeout: Duration) -> RemoteResult {
        let timeout_ms = timeout.as_millis() as u64;
        let url = server.url(&self.config.peer_status_path);

        let started = Instant::now();
        let response = self
            .peer_client
            .get(&url)
            .headers(peer_request_headers(
                &server.api_key,
                &self.identity.id,
                "application/json",
            ))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| PeerError::classify(e, timeout_ms))?;
        let latency = started.elapsed();

        metrics::histogram!("ollamify_peer_status_latency_seconds", "server" => server.cache_key().to_string())
            .record(latency.as_secs_f64());

        let status_code = response.status();
        if !status_code.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PeerError::Http {
                status: status_code.as_u16(),
                body: if body.is_empty() {
                    "no body".to_string()
                } else {
                    body
                },
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| PeerError::classify(e, timeout_ms))?;
        let mut status: ClusterStatus =
            serde_json::from_str(&body).map_err(|e| PeerError::Parse(e.to_string()))?;

        status.remote = Some(RemoteInfo {
            id: Some(server.id.clone()).filter(|id| !id.is_empty()),
            name: Some(server.name.clone()).filter(|name| !name.is_empty()),
            base_url: server.base_url.clone(),
            latency_ms: latency.as_millis() as u64,
        });

        tracing::debug!(
            server = %server.name,
            latency_ms = latency.as_millis() as u64,
            "Fetched friendly server status"
        );
        Ok(Arc::new(status))
    }
}

#[cfg(test)]
mod tests;
