//! Accelerator metric sample types.

use serde::{Deserialize, Serialize};

/// One accelerator as reported by the telemetry sidecar.
///
/// Every numeric field is optional; drivers omit what they cannot measure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuMetricSample {
    pub index: Option<u32>,
    pub name: Option<String>,
    pub utilization_gpu_percent: Option<f64>,
    pub utilization_mem_percent: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub memory_total_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_free_mb: Option<f64>,
    pub temperature_c: Option<f64>,
    pub power_w: Option<f64>,
}

impl GpuMetricSample {
    /// Memory pressure as a whole percentage in `[0, 100]`.
    ///
    /// `None` when either reading is missing or the total is not positive.
    pub fn vram_util_percent(&self) -> Option<f64> {
        let used = self.memory_used_mb.filter(|v| v.is_finite())?;
        let total = self.memory_total_mb.filter(|v| v.is_finite())?;
        if total <= 0.0 {
            return None;
        }
        Some((used / total * 100.0).round().clamp(0.0, 100.0))
    }
}

/// Result of one metrics read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GpuMetricsReport {
    pub gpus: Vec<GpuMetricSample>,
    #[serde(rename = "metricsAvailable")]
    pub metrics_available: bool,
    #[serde(rename = "metricsStale")]
    pub metrics_stale: bool,
    /// Time of the last successful read (epoch ms)
    #[serde(rename = "metricsUpdatedAt")]
    pub metrics_updated_at: Option<u64>,
}
