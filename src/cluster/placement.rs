//! Model placement derived from a cluster status.

use super::status::ClusterStatus;
use serde::{Deserialize, Serialize};

/// Where a model sits on one node and how busy that spot is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPlacement {
    pub installed: bool,
    pub loaded: bool,
    pub instance_id: Option<u32>,
    pub gpu: Option<u32>,
    pub gpu_util_percent: Option<f64>,
    pub vram_util_percent: Option<f64>,
    pub in_flight: u64,
}

/// Cross-reference a status against a model name.
///
/// Missing status or model yields an absent placement. The accelerator
/// reported by the loaded entry (runtime placement) is preferred over the one
/// reported by the installed entry.
pub fn model_placement(status: Option<&ClusterStatus>, model: Option<&str>) -> ModelPlacement {
    let model = model.map(str::trim).filter(|m| !m.is_empty());
    let (Some(status), Some(model)) = (status, model) else {
        return ModelPlacement::default();
    };

    let installed = status
        .models
        .installed
        .iter()
        .find(|entry| entry.installed_name() == Some(model));
    let loaded = status
        .models
        .loaded
        .iter()
        .find(|entry| entry.loaded_name() == Some(model));

    let gpu = loaded
        .and_then(|entry| entry.gpu)
        .or_else(|| installed.and_then(|entry| entry.gpu));

    let sample = gpu.and_then(|index| status.gpu(index));
    let gpu_util_percent = sample
        .and_then(|s| s.utilization_gpu_percent)
        .filter(|v| v.is_finite());
    let vram_util_percent = sample.and_then(|s| s.vram_util_percent());

    let in_flight = gpu
        .and_then(|index| status.load.in_flight_by_instance.get(&index.to_string()))
        .copied()
        .unwrap_or(0);

    ModelPlacement {
        installed: installed.is_some(),
        loaded: loaded.is_some(),
        instance_id: gpu,
        gpu,
        gpu_util_percent,
        vram_util_percent,
        in_flight,
    }
}
