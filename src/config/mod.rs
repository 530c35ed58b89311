//! Configuration module for Ollamify
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OLLAMIFY_*`, `OLLAMA_URL`, `GPU_INFO_URL`, ...)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use ollamify::config::OllamifyConfig;
//!
//! let config = OllamifyConfig::default();
//! assert_eq!(config.server.port, 8080);
//!
//! let toml = r#"
//! [instances]
//! primary_url = "http://localhost:11434"
//! "#;
//! let config: OllamifyConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.instances.primary_url, "http://localhost:11434");
//! ```

pub mod error;
pub mod friendly;
pub mod instances;
pub mod logging;
pub mod routing;
pub mod server;
pub mod telemetry;

pub use error::ConfigError;
pub use friendly::FriendlyServerConfig;
pub use instances::InstancesConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use routing::{CostWeightsConfig, RoutingConfig};
pub use server::{NodeConfig, ServerConfig};
pub use telemetry::TelemetryConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for an Ollamify node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OllamifyConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Node identity
    pub node: NodeConfig,
    /// Local inference instances
    pub instances: InstancesConfig,
    /// GPU telemetry sidecar
    pub telemetry: TelemetryConfig,
    /// Peer routing
    pub routing: RoutingConfig,
    /// Statically configured peers
    pub friendly_servers: Vec<FriendlyServerConfig>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Parse the boolean-ish values accepted in env vars and headers.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl OllamifyConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: p.to_path_buf(),
                    message: e.to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`, keyed by environment variable name.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let truthy = |name: &str| lookup(name).map(|v| is_truthy(&v));

        if let Some(port) = lookup("OLLAMIFY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(host) = lookup("OLLAMIFY_HOST") {
            self.server.host = host;
        }

        if let Some(level) = lookup("OLLAMIFY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("OLLAMIFY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Some(id) = lookup("OLLAMIFY_SERVER_ID") {
            if !id.trim().is_empty() {
                self.node.id = Some(id);
            }
        }

        // Instances
        if let Some(url) = lookup("OLLAMA_URL") {
            if !url.trim().is_empty() {
                self.instances.primary_url = url;
            }
        }
        if let Some(url) = lookup("OLLAMA1_URL") {
            if !url.trim().is_empty() {
                match self.instances.secondary_urls.first_mut() {
                    Some(first) => *first = url,
                    None => self.instances.secondary_urls.push(url),
                }
            }
        }

        if let Some(url) = lookup("GPU_INFO_URL") {
            if !url.trim().is_empty() {
                self.telemetry.url = url;
            }
        }

        if let Some(disabled) = truthy("FRIENDLY_ROUTING_DISABLED") {
            self.routing.enabled = !disabled;
        }
        if let Some(insecure) = truthy("FRIENDLY_SERVERS_INSECURE_TLS") {
            self.routing.insecure_tls = insecure;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        if self.instances.primary_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "instances.primary_url".to_string(),
                message: "primary instance URL cannot be empty".to_string(),
            });
        }

        let ttls = [
            ("instances.index_ttl_ms", self.instances.index_ttl_ms),
            ("routing.local_status_ttl_ms", self.routing.local_status_ttl_ms),
            ("routing.remote_status_ttl_ms", self.routing.remote_status_ttl_ms),
            ("routing.friendly_list_ttl_ms", self.routing.friendly_list_ttl_ms),
        ];
        for (field, ttl) in ttls {
            if ttl == 0 {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    message: "TTL must be non-zero".to_string(),
                });
            }
        }

        if !(self.routing.improvement_margin >= 0.0) {
            return Err(ConfigError::Validation {
                field: "routing.improvement_margin".to_string(),
                message: "margin must be a non-negative number".to_string(),
            });
        }

        self.logging.validate()?;

        for (i, server) in self.friendly_servers.iter().enumerate() {
            if server.name.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("friendly_servers[{}].name", i),
                    message: "name cannot be empty".to_string(),
                });
            }
            if server.base_url.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("friendly_servers[{}].base_url", i),
                    message: "URL cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}
