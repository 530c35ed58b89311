//! Output formatting helpers for CLI commands

use crate::cluster::ClusterStatus;
use crate::telemetry::GpuMetricSample;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Routing verdict as returned by `/api/cluster/route`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteView {
    pub target: TargetView,
    #[serde(default)]
    pub cost: Option<f64>,
    pub trace: TraceView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetView {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub server: Option<ServerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerView {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceView {
    pub reason: String,
    #[serde(default)]
    pub local_cost: Option<f64>,
    #[serde(default)]
    pub candidates: Vec<CandidateView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateView {
    pub server: String,
    pub status: String,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub selected: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

fn format_cost(cost: Option<f64>) -> String {
    cost.map_or_else(|| "-".to_string(), |c| format!("{:.1}", c))
}

fn format_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.0}%", v))
}

/// Render an epoch-millisecond timestamp in UTC.
pub fn format_timestamp(epoch_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

fn gpu_label(gpu: &GpuMetricSample) -> String {
    match (gpu.index, gpu.name.as_deref()) {
        (Some(index), Some(name)) => format!("{} {}", index, name),
        (Some(index), None) => index.to_string(),
        (None, Some(name)) => name.to_string(),
        (None, None) => "?".to_string(),
    }
}

/// Format a cluster status as tables
pub fn format_status_pretty(status: &ClusterStatus) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Node: {} ({})",
        status.server.id.bold(),
        status.server.hostname
    );
    let _ = writeln!(output, "Updated: {}", format_timestamp(status.updated_at));
    let telemetry = match (status.metrics_available, status.metrics_stale) {
        (true, false) => "live".green(),
        (true, true) => "stale".yellow(),
        _ => "unavailable".red(),
    };
    let _ = writeln!(output, "Telemetry: {}", telemetry);
    let _ = writeln!(output, "In flight: {}", status.load.in_flight_total);
    let _ = writeln!(output);

    let mut instances = Table::new();
    instances.load_preset(UTF8_FULL);
    instances.set_content_arrangement(ContentArrangement::Dynamic);
    instances.set_header(vec!["ID", "Name", "URL", "Installed", "Loaded", "In flight"]);
    for instance in &status.instances {
        let count = |models: &[crate::instances::ModelEntry]| {
            models.iter().filter(|m| m.gpu == Some(instance.id)).count()
        };
        let in_flight = status
            .load
            .in_flight_by_instance
            .get(&instance.id.to_string())
            .copied()
            .unwrap_or(0);
        instances.add_row(vec![
            Cell::new(instance.id),
            Cell::new(&instance.name),
            Cell::new(&instance.base_url),
            Cell::new(count(status.models.installed.as_slice())),
            Cell::new(count(status.models.loaded.as_slice())),
            Cell::new(in_flight),
        ]);
    }
    let _ = writeln!(output, "{}", instances);

    if !status.gpus.is_empty() {
        let mut gpus = Table::new();
        gpus.load_preset(UTF8_FULL);
        gpus.set_content_arrangement(ContentArrangement::Dynamic);
        gpus.set_header(vec!["GPU", "Util", "VRAM", "Temp", "Power"]);
        for gpu in &status.gpus {
            gpus.add_row(vec![
                Cell::new(gpu_label(gpu)),
                Cell::new(format_percent(gpu.utilization_gpu_percent)),
                Cell::new(format_percent(gpu.vram_util_percent())),
                Cell::new(
                    gpu.temperature_c
                        .map_or_else(|| "-".to_string(), |t| format!("{:.0}°C", t)),
                ),
                Cell::new(gpu.power_w.map_or_else(|| "-".to_string(), |p| format!("{:.0} W", p))),
            ]);
        }
        let _ = writeln!(output, "{}", gpus);
    }

    let loaded: Vec<_> = status
        .models
        .loaded
        .iter()
        .filter_map(|m| m.loaded_name())
        .collect();
    let _ = writeln!(
        output,
        "Loaded models: {}",
        if loaded.is_empty() {
            "none".to_string()
        } else {
            loaded.join(", ")
        }
    );

    output
}

/// Format a routing verdict
pub fn format_route_pretty(model: &str, route: &RouteView) -> String {
    let mut output = String::new();

    let target = match (&route.target.kind[..], &route.target.server) {
        ("friendly", Some(server)) => {
            let label = [&server.id, &server.name, &server.base_url]
                .into_iter()
                .find(|s| !s.is_empty())
                .cloned()
                .unwrap_or_default();
            format!("friendly:{}", label).cyan()
        }
        _ => "local".green(),
    };
    let _ = writeln!(output, "Model: {}", model.bold());
    let _ = writeln!(output, "Target: {}", target);
    let _ = writeln!(output, "Reason: {}", route.trace.reason);
    let _ = writeln!(output, "Local cost: {}", format_cost(route.trace.local_cost));

    if !route.trace.candidates.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Peer", "Status", "Cost", "Latency", "Selected"]);
        for candidate in &route.trace.candidates {
            let status = match candidate.status.as_str() {
                "scored" => candidate.status.green().to_string(),
                "unreachable" => candidate.status.red().to_string(),
                _ => candidate.status.yellow().to_string(),
            };
            table.add_row(vec![
                Cell::new(&candidate.server),
                Cell::new(status),
                Cell::new(format_cost(candidate.cost)),
                Cell::new(
                    candidate
                        .latency_ms
                        .map_or_else(|| "-".to_string(), |l| format!("{}ms", l)),
                ),
                Cell::new(if candidate.selected == Some(true) { "✓" } else { "" }),
            ]);
        }
        let _ = writeln!(output, "{}", table);
    }

    output
}
