//! Error types for instance queries.

use thiserror::Error;

/// Failure talking to a single local inference instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// Request timeout
    #[error("request timeout after {0}ms")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Non-success HTTP status
    #[error("HTTP error: {0}")]
    Http(u16),

    /// Invalid response body
    #[error("invalid response: {0}")]
    Parse(String),
}

impl InstanceError {
    /// Classify a reqwest error.
    pub fn classify(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            InstanceError::Timeout(timeout_ms)
        } else if e.is_decode() {
            InstanceError::Parse(e.to_string())
        } else {
            InstanceError::Connection(e.to_string())
        }
    }
}
