//! Error types for peer status fetches.

use thiserror::Error;

/// Failure fetching a peer's cluster status.
///
/// Cached per peer for the remote TTL, so it is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    /// Peer is missing its base URL or credential
    #[error("invalid friendly server config: {0}")]
    InvalidConfig(String),

    #[error("peer status timeout after {0}ms")]
    Timeout(u64),

    #[error("peer connection failed: {0}")]
    Connection(String),

    #[error("peer status failed ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("invalid peer status: {0}")]
    Parse(String),
}

impl PeerError {
    pub fn classify(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            PeerError::Timeout(timeout_ms)
        } else if e.is_decode() {
            PeerError::Parse(e.to_string())
        } else {
            PeerError::Connection(e.to_string())
        }
    }
}
