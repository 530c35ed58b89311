//! Friendly servers: peer nodes eligible to receive forwarded requests.
//!
//! The routing engine only consumes the list of enabled peers that carry a
//! credential. Where that list comes from is behind [`FriendlyServerSource`];
//! [`StaticFriendlyServers`] serves it from the configuration file.

use crate::config::FriendlyServerConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A peer node with its credential.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct FriendlyServer {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub enabled: bool,
}

impl FriendlyServer {
    /// Key under which this peer's status is cached.
    pub fn cache_key(&self) -> &str {
        if self.id.is_empty() {
            &self.base_url
        } else {
            &self.id
        }
    }

    /// Identifier written into provenance headers.
    pub fn label(&self) -> &str {
        [&self.id, &self.name, &self.base_url]
            .into_iter()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    /// Join an endpoint path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn masked_api_key(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

impl fmt::Debug for FriendlyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FriendlyServer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_key", &self.masked_api_key())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Failure obtaining the peer list.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("friendly server source unavailable: {0}")]
    Unavailable(String),
}

/// Supplier of the enabled, credentialed peer list.
#[async_trait]
pub trait FriendlyServerSource: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<FriendlyServer>, SourceError>;
}

/// Peers declared in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticFriendlyServers {
    servers: Vec<FriendlyServerConfig>,
}

impl StaticFriendlyServers {
    pub fn new(servers: Vec<FriendlyServerConfig>) -> Self {
        Self { servers }
    }

    fn resolve(config: &FriendlyServerConfig) -> Option<FriendlyServer> {
        if !config.enabled {
            return None;
        }
        let Some(api_key) = config.resolve_api_key() else {
            tracing::debug!(server = %config.name, "Skipping friendly server without API key");
            return None;
        };
        let Some(base_url) = normalize_base_url(&config.base_url) else {
            tracing::debug!(server = %config.name, "Skipping friendly server without base URL");
            return None;
        };

        let id = config
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| config.name.clone());

        Some(FriendlyServer {
            id,
            name: config.name.clone(),
            base_url,
            username: config.username.clone(),
            api_key,
            enabled: true,
        })
    }
}

#[async_trait]
impl FriendlyServerSource for StaticFriendlyServers {
    async fn list_enabled(&self) -> Result<Vec<FriendlyServer>, SourceError> {
        Ok(self.servers.iter().filter_map(Self::resolve).collect())
    }
}

/// Normalise a user-entered peer address.
///
/// Adds `http://` when no scheme is given, strips trailing slashes and a
/// trailing `/api` gateway prefix. Returns `None` for blank input.
pub fn normalize_base_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    let mut url = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let without_slashes = url.trim_end_matches('/').len();
    url.truncate(without_slashes);
    if url.to_ascii_lowercase().ends_with("/api") {
        url.truncate(url.len() - "/api".len());
    }
    Some(url)
}

/// Mask a credential for display.
///
/// Up to 4 characters are fully hidden, up to 8 show the last four, longer
/// keys also show the first two.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    let last4: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    match chars.len() {
        0..=4 => "****".to_string(),
        5..=8 => format!("****{}", last4),
        _ => {
            let first2: String = chars[..2].iter().collect();
            format!("{}****{}", first2, last4)
        }
    }
}
