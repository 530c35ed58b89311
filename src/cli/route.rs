//! Route command implementation

use crate::cli::output::{format_route_pretty, RouteView};
use crate::cli::{node_url, RouteArgs};
use std::time::Duration;

/// Handle `ollamify route` command
///
/// Asks the node for its verdict without executing anything.
pub async fn handle_route(args: &RouteArgs) -> Result<String, Box<dyn std::error::Error>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let mut request = client
        .get(node_url(&args.url, "/api/cluster/route"))
        .query(&[("model", args.model.as_str())]);
    if let Some(key) = args.api_key.as_deref().filter(|k| !k.is_empty()) {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(format!("node answered {}", response.status()).into());
    }

    let body: serde_json::Value = response.json().await?;
    if args.json {
        return Ok(serde_json::to_string_pretty(&body)?);
    }

    let route: RouteView = serde_json::from_value(body)?;
    Ok(format_route_pretty(&args.model, &route))
}
