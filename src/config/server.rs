//! Server and node identity configuration

use serde::{Deserialize, Serialize};

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 600,
        }
    }
}

/// Identity this node reports in status documents and provenance headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Explicit node id. Falls back to `DOMAIN`, then the host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl NodeConfig {
    /// Resolve the node id used on the wire.
    pub fn resolve_id(&self) -> String {
        self.resolve_id_from(|name| std::env::var(name).ok())
    }

    /// Resolve the node id, reading `DOMAIN` through `lookup`.
    pub fn resolve_id_from(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        self.id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| lookup("DOMAIN").filter(|d| !d.trim().is_empty()))
            .unwrap_or_else(local_hostname)
    }
}

/// Host name of this machine, or `localhost` when it cannot be read.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
