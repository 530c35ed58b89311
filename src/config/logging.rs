//! `[logging]` section

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::ConfigError;

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Validation {
                field: "logging.format".to_string(),
                message: format!("expected 'pretty' or 'json', got '{}'", s),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-component overrides keyed by module under `ollamify::`, e.g. `routing = "debug"`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Reject level names the tracing filter would not understand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let known = |level: &str| LEVELS.contains(&level.to_ascii_lowercase().as_str());

        if !known(&self.level) {
            return Err(ConfigError::Validation {
                field: "logging.level".to_string(),
                message: format!("unknown level '{}'", self.level),
            });
        }
        for (component, level) in &self.component_levels {
            if !known(level) {
                return Err(ConfigError::Validation {
                    field: format!("logging.component_levels.{}", component),
                    message: format!("unknown level '{}'", level),
                });
            }
        }
        Ok(())
    }
}
