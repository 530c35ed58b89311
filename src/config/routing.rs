//! Routing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Peer routing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// When false every request executes locally
    pub enabled: bool,
    /// Accept self-signed TLS certificates from friendly servers
    pub insecure_tls: bool,
    pub local_status_ttl_ms: u64,
    pub remote_status_ttl_ms: u64,
    pub friendly_list_ttl_ms: u64,
    pub peer_status_timeout_ms: u64,
    pub peer_status_path: String,
    pub forward_timeout_seconds: u64,
    /// Minimum cost improvement a peer needs over the current best
    pub improvement_margin: f64,
    /// Local GPU utilization below which a warm idle model short-circuits to local
    pub warm_gpu_util_threshold: f64,
    /// Model name prefixes served by external providers, never routed
    pub external_model_prefixes: Vec<String>,
    pub weights: CostWeightsConfig,
}

/// Cost formula coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeightsConfig {
    pub cold_penalty: f64,
    pub in_flight: f64,
    pub gpu_util: f64,
    pub vram_util: f64,
    pub latency_divisor_ms: f64,
    pub latency_cap: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            insecure_tls: false,
            local_status_ttl_ms: 1_500,
            remote_status_ttl_ms: 1_500,
            friendly_list_ttl_ms: 5_000,
            peer_status_timeout_ms: 3_500,
            peer_status_path: "/api/cluster/status".to_string(),
            forward_timeout_seconds: 600,
            improvement_margin: 15.0,
            warm_gpu_util_threshold: 70.0,
            external_model_prefixes: vec!["openrouter/".to_string()],
            weights: CostWeightsConfig::default(),
        }
    }
}

impl Default for CostWeightsConfig {
    fn default() -> Self {
        Self {
            cold_penalty: 60.0,
            in_flight: 25.0,
            gpu_util: 0.6,
            vram_util: 0.2,
            latency_divisor_ms: 20.0,
            latency_cap: 50.0,
        }
    }
}

impl From<CostWeightsConfig> for crate::routing::CostWeights {
    fn from(weights: CostWeightsConfig) -> Self {
        crate::routing::CostWeights {
            cold_penalty: weights.cold_penalty,
            in_flight: weights.in_flight,
            gpu_util: weights.gpu_util,
            vram_util: weights.vram_util,
            latency_divisor_ms: weights.latency_divisor_ms,
            latency_cap: weights.latency_cap,
        }
    }
}

impl RoutingConfig {
    pub fn local_status_ttl(&self) -> Duration {
        Duration::from_millis(self.local_status_ttl_ms)
    }

    pub fn remote_status_ttl(&self) -> Duration {
        Duration::from_millis(self.remote_status_ttl_ms)
    }

    pub fn friendly_list_ttl(&self) -> Duration {
        Duration::from_millis(self.friendly_list_ttl_ms)
    }

    pub fn peer_status_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_status_timeout_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_seconds)
    }

    /// Whether the model is served by an external provider.
    pub fn is_external_model(&self, model: &str) -> bool {
        self.external_model_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && model.starts_with(prefix.as_str()))
    }
}
