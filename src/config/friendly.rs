//! Friendly server (peer node) definitions

use serde::{Deserialize, Serialize};

/// A statically configured peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendlyServerConfig {
    /// Stable identifier; defaults to the name when omitted
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Inline API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key (takes precedence over `api_key`)
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl FriendlyServerConfig {
    /// Resolve the credential, reading `api_key_env` when set.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_from(|name| std::env::var(name).ok())
    }

    /// Resolve the credential, reading `api_key_env` through `lookup`.
    pub fn resolve_api_key_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(lookup)
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}
