//! Accelerator metrics collector.
//!
//! Reads per-GPU samples from the telemetry sidecar. When the sidecar is
//! unreachable the last good sample is served (flagged stale) for a bounded
//! window, after which metrics are reported unavailable.

mod error;
mod sample;

pub use error::TelemetryError;
pub use sample::{GpuMetricSample, GpuMetricsReport};

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::config::TelemetryConfig;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const NEVER: u64 = u64::MAX;

#[derive(Deserialize)]
struct GpusResponse {
    #[serde(default)]
    gpus: Option<Vec<GpuMetricSample>>,
}

/// Polls the telemetry sidecar with a stale-cache fallback.
pub struct GpuMetricsCollector {
    config: TelemetryConfig,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    last_good: TtlCache<Arc<Vec<GpuMetricSample>>>,
    last_warn_ms: AtomicU64,
}

impl GpuMetricsCollector {
    pub fn new(config: TelemetryConfig, client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        let last_good = TtlCache::new(Duration::from_millis(config.stale_window_ms));
        Self {
            config,
            client,
            clock,
            last_good,
            last_warn_ms: AtomicU64::new(NEVER),
        }
    }

    /// Read current accelerator metrics.
    ///
    /// Never fails: a sidecar failure degrades to the stale sample or to an
    /// empty, unavailable report.
    pub async fn get_gpu_metrics(&self) -> GpuMetricsReport {
        match self.fetch().await {
            Ok(gpus) => {
                let now = self.clock.now_ms();
                let gpus = Arc::new(gpus);
                self.last_good.insert(Arc::clone(&gpus), now);
                GpuMetricsReport {
                    gpus: gpus.as_ref().clone(),
                    metrics_available: true,
                    metrics_stale: false,
                    metrics_updated_at: Some(now),
                }
            }
            Err(error) => {
                let now = self.clock.now_ms();
                if self.should_warn(now) {
                    tracing::warn!(
                        url = %self.config.endpoint(),
                        error = %error,
                        "GPU metrics not available"
                    );
                }

                let updated_at = self.last_good.last().map(|entry| entry.updated_at_ms);
                match self.last_good.get_fresh(now) {
                    Some(gpus) => GpuMetricsReport {
                        gpus: gpus.as_ref().clone(),
                        metrics_available: true,
                        metrics_stale: true,
                        metrics_updated_at: updated_at,
                    },
                    None => GpuMetricsReport {
                        gpus: Vec::new(),
                        metrics_available: false,
                        metrics_stale: false,
                        metrics_updated_at: updated_at,
                    },
                }
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<GpuMetricSample>, TelemetryError> {
        let timeout_ms = self.config.timeout_ms;
        let response = self
            .client
            .get(self.config.endpoint())
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| TelemetryError::classify(e, timeout_ms))?;

        if !response.status().is_success() {
            return Err(TelemetryError::Http(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TelemetryError::classify(e, timeout_ms))?;
        let parsed: GpusResponse =
            serde_json::from_str(&body).map_err(|e| TelemetryError::Parse(e.to_string()))?;
        Ok(parsed.gpus.unwrap_or_default())
    }

    /// At most one warning per `warn_interval_ms`.
    fn should_warn(&self, now_ms: u64) -> bool {
        let last = self.last_warn_ms.load(Ordering::SeqCst);
        if last != NEVER && now_ms.saturating_sub(last) < self.config.warn_interval_ms {
            return false;
        }
        self.last_warn_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector(url: &str, clock: &ManualClock) -> GpuMetricsCollector {
        let config = TelemetryConfig {
            url: url.to_string(),
            timeout_ms: 300,
            ..TelemetryConfig::default()
        };
        GpuMetricsCollector::new(config, reqwest::Client::new(), Arc::new(clock.clone()))
    }

    fn gpus_body() -> serde_json::Value {
        json!({"gpus": [
            {"index": 0, "name": "GPU A", "utilization_gpu_percent": 35, "memory_used_mb": 2048, "memory_total_mb": 8192}
        ]})
    }

    #[tokio::test]
    async fn test_metrics_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gpus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gpus_body()))
            .mount(&server)
            .await;

        let clock = ManualClock::new(10_000);
        let report = collector(&server.uri(), &clock).get_gpu_metrics().await;

        assert!(report.metrics_available);
        assert!(!report.metrics_stale);
        assert_eq!(report.gpus.len(), 1);
        assert_eq!(report.gpus[0].utilization_gpu_percent, Some(35.0));
        assert_eq!(report.metrics_updated_at, Some(10_000));
    }

    #[tokio::test]
    async fn test_metrics_stale_fallback_then_unavailable() {
        // Given one successful read
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gpus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gpus_body()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gpus"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let clock = ManualClock::new(0);
        let collector = collector(&server.uri(), &clock);
        assert!(!collector.get_gpu_metrics().await.metrics_stale);

        // When the sidecar fails within the stale window
        clock.advance_ms(29_999);
        let stale = collector.get_gpu_metrics().await;

        // Then the cached sample is served and flagged stale
        assert!(stale.metrics_available);
        assert!(stale.metrics_stale);
        assert_eq!(stale.gpus.len(), 1);
        assert_eq!(stale.metrics_updated_at, Some(0));

        // And past the window metrics are unavailable
        clock.advance_ms(1);
        let gone = collector.get_gpu_metrics().await;
        assert!(!gone.metrics_available);
        assert!(!gone.metrics_stale);
        assert!(gone.gpus.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_unreachable_without_cache() {
        let clock = ManualClock::new(0);
        let report = collector("http://127.0.0.1:1", &clock).get_gpu_metrics().await;
        assert!(!report.metrics_available);
        assert!(report.gpus.is_empty());
        assert_eq!(report.metrics_updated_at, None);
    }

    #[tokio::test]
    async fn test_metrics_missing_gpus_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gpus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "no nvml"})))
            .mount(&server)
            .await;

        let clock = ManualClock::new(0);
        let report = collector(&server.uri(), &clock).get_gpu_metrics().await;
        assert!(report.metrics_available);
        assert!(report.gpus.is_empty());
    }

    #[test]
    fn test_warnings_rate_limited() {
        let clock = ManualClock::new(0);
        let collector = collector("http://unused", &clock);

        assert!(collector.should_warn(0));
        assert!(!collector.should_warn(5_000));
        assert!(!collector.should_warn(9_999));
        assert!(collector.should_warn(10_000));
        assert!(!collector.should_warn(10_001));
    }
}
