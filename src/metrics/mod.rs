//! # Metrics Collection Module
//!
//! Prometheus export for routing and relay activity, served on `GET /metrics`.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `ollamify_routing_decisions_total{target, reason}` - Routing verdicts
//! - `ollamify_peer_status_failures_total{server}` - Failed peer status fetches
//! - `ollamify_forward_requests_total{server, status}` - Forwarded requests
//!
//! **Histograms:**
//! - `ollamify_peer_status_latency_seconds{server}` - Peer status round trip
//!
//! **Gauges:**
//! - `ollamify_in_flight_requests` - Requests currently executing locally
//! - `ollamify_in_flight_by_instance{instance}` - Same, per instance
//! - `ollamify_uptime_seconds` - Seconds since startup

pub mod handler;

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::inflight::InFlightTracker;
use dashmap::DashSet;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;

/// Computes derived gauges and renders the exposition text.
pub struct MetricsCollector {
    inflight: Arc<InFlightTracker>,
    /// Instances that have had a per-instance gauge
    seen_instances: DashSet<String>,
    start_time: Instant,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    pub fn new(
        inflight: Arc<InFlightTracker>,
        start_time: Instant,
        prometheus_handle: PrometheusHandle,
    ) -> Self {
        Self {
            inflight,
            seen_instances: DashSet::new(),
            start_time,
            prometheus_handle,
        }
    }

    /// Get uptime in seconds since startup.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Refresh gauges derived from the in-flight counters.
    pub fn update_load_gauges(&self) {
        let snapshot = self.inflight.snapshot();
        for (instance, count) in &snapshot.by_instance {
            self.seen_instances.insert(instance.clone());
            metrics::gauge!("ollamify_in_flight_by_instance", "instance" => instance.clone())
                .set(*count as f64);
        }
        // Idle instances drop out of the snapshot; report them as zero
        for instance in self.seen_instances.iter() {
            if !snapshot.by_instance.contains_key(instance.key()) {
                metrics::gauge!("ollamify_in_flight_by_instance", "instance" => instance.key().clone())
                    .set(0.0);
            }
        }
        metrics::gauge!("ollamify_uptime_seconds").set(self.uptime_seconds() as f64);
    }

    /// Render Prometheus metrics in text format.
    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// Peer latency buckets are in seconds and sized around the status timeout.
pub fn setup_metrics() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::Matcher;

    let latency_buckets = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.5, 5.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ollamify_peer_status_latency_seconds".to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}

/// A handle from the installed recorder, or a detached one when a recorder
/// already exists (tests build many app states in one process).
pub fn handle_or_detached() -> PrometheusHandle {
    setup_metrics().unwrap_or_else(|e| {
        tracing::debug!("Metrics already initialized, creating new handle: {}", e);
        PrometheusBuilder::new().build_recorder().handle()
    })
}
