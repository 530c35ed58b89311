//! Structured logging helpers
//!
//! Filter construction for the tracing subscriber and the correlation id
//! attached to every relayed request.

use crate::config::LoggingConfig;
use uuid::Uuid;

/// Build filter directives string from LoggingConfig
///
/// The base level comes first, followed by one `ollamify::<component>=<level>`
/// directive per configured component, sorted by component name.
///
/// # Examples
///
/// ```
/// use ollamify::config::{LogFormat, LoggingConfig};
/// use ollamify::logging::build_filter_directives;
/// use std::collections::BTreeMap;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: BTreeMap::from([("routing".to_string(), "debug".to_string())]),
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,ollamify::routing=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",ollamify::{}={}", component, level));
    }

    filter_str
}

/// Generate a new request ID using UUID v4
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
