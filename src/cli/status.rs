//! Status command implementation

use crate::cli::output::format_status_pretty;
use crate::cli::{node_url, StatusArgs};
use crate::cluster::{ClusterStatus, PeerError};
use std::time::Duration;

/// Fetch a node's cluster status.
pub async fn fetch_status(args: &StatusArgs) -> Result<ClusterStatus, PeerError> {
    let client = reqwest::Client::new();
    let mut request = client
        .get(node_url(&args.url, "/api/cluster/status"))
        .timeout(Duration::from_millis(args.timeout_ms));
    if let Some(key) = args.api_key.as_deref().filter(|k| !k.is_empty()) {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| PeerError::classify(e, args.timeout_ms))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PeerError::Http {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<ClusterStatus>()
        .await
        .map_err(|e| PeerError::Parse(e.to_string()))
}

/// Handle `ollamify status` command
pub async fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let status = fetch_status(args).await?;
    if args.json {
        Ok(serde_json::to_string_pretty(&status)?)
    } else {
        Ok(format_status_pretty(&status))
    }
}
