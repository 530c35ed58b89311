//! Error types for the telemetry sidecar.

use thiserror::Error;

/// Failure reading accelerator metrics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("invalid response: {0}")]
    Parse(String),
}

impl TelemetryError {
    pub fn classify(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            TelemetryError::Timeout(timeout_ms)
        } else if e.is_decode() {
            TelemetryError::Parse(e.to_string())
        } else {
            TelemetryError::Connection(e.to_string())
        }
    }
}
