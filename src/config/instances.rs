//! Local inference instance configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Addresses and timeouts for the local Ollama instances.
///
/// The primary instance (id 0) is always assumed present. Each secondary URL
/// becomes instance `1..` and is only listed when it answers the version probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancesConfig {
    pub primary_url: String,
    pub secondary_urls: Vec<String>,
    pub probe_timeout_ms: u64,
    pub tags_timeout_ms: u64,
    pub running_timeout_ms: u64,
    pub index_ttl_ms: u64,
    pub version_path: String,
    pub tags_path: String,
    pub running_path: String,
}

impl Default for InstancesConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://ollama:11434".to_string(),
            secondary_urls: vec!["http://ollama1:11434".to_string()],
            probe_timeout_ms: 700,
            tags_timeout_ms: 5_000,
            running_timeout_ms: 5_000,
            index_ttl_ms: 5_000,
            version_path: "/api/version".to_string(),
            tags_path: "/api/tags".to_string(),
            running_path: "/api/ps".to_string(),
        }
    }
}

impl InstancesConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn tags_timeout(&self) -> Duration {
        Duration::from_millis(self.tags_timeout_ms)
    }

    pub fn running_timeout(&self) -> Duration {
        Duration::from_millis(self.running_timeout_ms)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_millis(self.index_ttl_ms)
    }
}
