//! Cluster status document.
//!
//! Field names match the JSON peers exchange over `/api/cluster/status`, so
//! nodes of different versions can read each other's status.

use crate::inflight::InFlightSnapshot;
use crate::instances::{Instance, ModelEntry};
use crate::telemetry::GpuMetricSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of the node that produced a status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerIdentity {
    pub id: String,
    pub hostname: String,
}

/// In-flight counters as published.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadInfo {
    pub in_flight_total: u64,
    pub in_flight_by_instance: BTreeMap<String, u64>,
    pub in_flight_by_model: BTreeMap<String, u64>,
}

impl From<InFlightSnapshot> for LoadInfo {
    fn from(snapshot: InFlightSnapshot) -> Self {
        Self {
            in_flight_total: snapshot.total,
            in_flight_by_instance: snapshot.by_instance,
            in_flight_by_model: snapshot.by_model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsInfo {
    pub installed: Vec<ModelEntry>,
    pub loaded: Vec<ModelEntry>,
}

/// Annotation added to a status fetched from a peer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub base_url: String,
    pub latency_ms: u64,
}

/// Everything routing needs to know about one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStatus {
    pub server: ServerIdentity,
    #[serde(rename = "updatedAt")]
    pub updated_at: u64,
    pub instances: Vec<Instance>,
    pub gpus: Vec<GpuMetricSample>,
    #[serde(rename = "metricsAvailable")]
    pub metrics_available: bool,
    #[serde(rename = "metricsStale")]
    pub metrics_stale: bool,
    #[serde(rename = "metricsUpdatedAt")]
    pub metrics_updated_at: Option<u64>,
    pub load: LoadInfo,
    pub models: ModelsInfo,
    #[serde(rename = "_remote", skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteInfo>,
}

impl ClusterStatus {
    /// Measured round trip to the peer, 0 for a local status.
    pub fn latency_ms(&self) -> u64 {
        self.remote.as_ref().map_or(0, |remote| remote.latency_ms)
    }

    pub fn gpu(&self, index: u32) -> Option<&GpuMetricSample> {
        self.gpus.iter().find(|gpu| gpu.index == Some(index))
    }
}
