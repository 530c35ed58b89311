//! GPU telemetry sidecar configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where to read accelerator metrics and how long to tolerate outages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub url: String,
    pub path: String,
    pub timeout_ms: u64,
    /// How long a last-good sample may be served when the sidecar is down
    pub stale_window_ms: u64,
    /// Minimum spacing between "metrics unavailable" warnings
    pub warn_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: "http://gpu-info:8005".to_string(),
            path: "/gpus".to_string(),
            timeout_ms: 3_500,
            stale_window_ms: 30_000,
            warn_interval_ms: 10_000,
        }
    }
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.path)
    }
}
