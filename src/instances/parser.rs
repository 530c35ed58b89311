//! Response parsing for the instance model listings.

use super::error::InstanceError;
use super::types::{Instance, ModelEntry};
use serde::Deserialize;

/// Shape shared by the installed (`/api/tags`) and loaded (`/api/ps`) listings.
#[derive(Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    models: Option<Vec<ModelEntry>>,
}

/// Parse a model listing and tag every entry with the instance it came from.
///
/// A body without a `models` array yields an empty list.
pub fn parse_model_list(body: &str, instance: &Instance) -> Result<Vec<ModelEntry>, InstanceError> {
    let response: ModelListResponse =
        serde_json::from_str(body).map_err(|e| InstanceError::Parse(e.to_string()))?;

    Ok(response
        .models
        .unwrap_or_default()
        .into_iter()
        .map(|mut entry| {
            entry.gpu = Some(instance.id);
            entry.gpu_label = Some(instance.name.clone());
            entry
        })
        .collect())
}
