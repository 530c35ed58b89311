//! Instance and model index types.

use super::error::InstanceError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One local accelerator-backed inference process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: u32,
    pub name: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

impl Instance {
    pub fn new(id: u32, base_url: &str) -> Self {
        Self {
            id,
            name: format!("GPU {}", id),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Join an endpoint path onto the instance base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// A model as reported by an instance listing.
///
/// Installed listings name the model in `name`, loaded listings in `model`.
/// Fields this crate does not interpret are kept in `extra` and re-emitted
/// as-is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    /// Instance id hosting this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_label: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

impl ModelEntry {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            model: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Identifier used when matching installed entries (`name`, then `model`).
    pub fn installed_name(&self) -> Option<&str> {
        non_empty(&self.name).or_else(|| non_empty(&self.model))
    }

    /// Identifier used when matching loaded entries (`model`, then `name`).
    pub fn loaded_name(&self) -> Option<&str> {
        non_empty(&self.model).or_else(|| non_empty(&self.name))
    }
}

/// Outcome of one per-instance query in a fan-out.
#[derive(Debug, Clone)]
pub struct SourceResult<T> {
    pub instance: Instance,
    pub outcome: Result<T, InstanceError>,
}

/// A failed per-instance query retained on the index for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub instance_id: u32,
    pub base_url: String,
    pub error: InstanceError,
}

/// Model placement across the local instances.
#[derive(Debug, Clone, Default)]
pub struct ModelIndex {
    pub updated_at_ms: u64,
    pub instances: Vec<Instance>,
    /// Model name to the first instance listing it
    pub model_to_instance: HashMap<String, Instance>,
    pub models_by_instance: BTreeMap<u32, Vec<ModelEntry>>,
    pub failures: Vec<SourceFailure>,
}

impl ModelIndex {
    /// Build an index from per-instance tag listings.
    ///
    /// A failed listing contributes zero models. When a model is installed on
    /// several instances the first instance in listing order wins.
    pub fn build(updated_at_ms: u64, results: Vec<SourceResult<Vec<ModelEntry>>>) -> Self {
        let mut index = ModelIndex {
            updated_at_ms,
            ..Default::default()
        };

        for SourceResult { instance, outcome } in results {
            let models = match outcome {
                Ok(models) => models,
                Err(error) => {
                    index.failures.push(SourceFailure {
                        instance_id: instance.id,
                        base_url: instance.base_url.clone(),
                        error,
                    });
                    Vec::new()
                }
            };

            for entry in &models {
                if let Some(name) = entry.installed_name() {
                    index
                        .model_to_instance
                        .entry(name.to_string())
                        .or_insert_with(|| instance.clone());
                }
            }
            index.models_by_instance.insert(instance.id, models);
            index.instances.push(instance);
        }

        index
    }

    pub fn instance_for(&self, model: &str) -> Option<&Instance> {
        self.model_to_instance.get(model.trim())
    }

    pub fn models_for(&self, instance_id: u32) -> &[ModelEntry] {
        self.models_by_instance
            .get(&instance_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All installed entries in instance order.
    pub fn installed(&self) -> Vec<ModelEntry> {
        self.models_by_instance.values().flatten().cloned().collect()
    }
}
