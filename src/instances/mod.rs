//! Instance directory and model index.
//!
//! Discovers which local inference instances are reachable and which models
//! each one has installed. The primary instance is always listed; secondary
//! instances are listed only while they answer a version probe. The index is
//! cached with a short TTL and refreshes are single-flight.

mod error;
mod parser;
mod types;


pub use error::InstanceError;
pub use parser::parse_model_list;
pub use types::{Instance, ModelEntry, ModelIndex, SourceFailure, SourceResult};

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::config::InstancesConfig;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Directory of local inference instances and their installed models.
pub struct InstanceDirectory {
    config: InstancesConfig,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    index: TtlCache<Arc<ModelIndex>>,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped after every completed refresh so waiters can coalesce
    generation: AtomicU64,
}

impl InstanceDirectory {
    pub fn new(config: InstancesConfig, client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        let index = TtlCache::new(config.index_ttl());
        Self {
            config,
            client,
            clock,
            index,
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// The always-present instance 0.
    pub fn primary(&self) -> Instance {
        Instance::new(0, &self.config.primary_url)
    }

    /// Primary instance plus every secondary that answers the version probe.
    ///
    /// Probes run concurrently; an unreachable secondary is omitted.
    pub async fn list_instances(&self) -> Vec<Instance> {
        let secondaries = self
            .config
            .secondary_urls
            .iter()
            .enumerate()
            .filter(|(_, url)| !url.trim().is_empty())
            .map(|(i, url)| Instance::new(i as u32 + 1, url));

        let probes = secondaries.map(|instance| async move {
            if self.probe(&instance).await {
                Some(instance)
            } else {
                None
            }
        });

        let mut instances = vec![self.primary()];
        instances.extend(join_all(probes).await.into_iter().flatten());
        instances
    }

    async fn probe(&self, instance: &Instance) -> bool {
        let url = instance.url(&self.config.version_path);
        match self
            .client
            .get(&url)
            .timeout(self.config.probe_timeout())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(
                    instance_id = instance.id,
                    base_url = %instance.base_url,
                    status = response.status().as_u16(),
                    "Instance probe returned non-success status"
                );
                false
            }
            Err(e) => {
                tracing::debug!(
                    instance_id = instance.id,
                    base_url = %instance.base_url,
                    error = %e,
                    "Instance probe failed"
                );
                false
            }
        }
    }

    /// Return the model index, rebuilding it when expired or when `force` is set.
    ///
    /// Concurrent refreshes coalesce: a caller that waited on an in-progress
    /// refresh returns that refresh's result instead of starting another.
    pub async fn refresh_model_index(&self, force: bool) -> Arc<ModelIndex> {
        if !force {
            if let Some(index) = self.index.get_fresh(self.clock.now_ms()) {
                return index;
            }
        }

        let seen_generation = self.generation.load(Ordering::SeqCst);
        let _guard = self.refresh_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen_generation {
            if let Some(entry) = self.index.last() {
                return entry.value;
            }
        }

        let started_at = self.clock.now_ms();
        let instances = self.list_instances().await;
        let results = self.fan_out(&instances, Fetch::Installed).await;
        let index = Arc::new(ModelIndex::build(started_at, results));

        for failure in &index.failures {
            tracing::warn!(
                instance_id = failure.instance_id,
                base_url = %failure.base_url,
                error = %failure.error,
                "Failed to fetch installed models, treating instance as empty"
            );
        }
        tracing::debug!(
            instances = index.instances.len(),
            models = index.model_to_instance.len(),
            "Model index refreshed"
        );

        self.index.insert(Arc::clone(&index), started_at);
        self.generation.fetch_add(1, Ordering::SeqCst);
        index
    }

    /// Instance hosting `model`, or the primary instance when unknown.
    pub async fn resolve_instance_for_model(&self, model: Option<&str>) -> Instance {
        let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) else {
            return self.primary();
        };

        let index = self.refresh_model_index(false).await;
        index
            .instance_for(model)
            .cloned()
            .unwrap_or_else(|| self.primary())
    }

    /// Query each instance for its currently loaded models.
    ///
    /// Every instance is queried independently; the result carries each
    /// instance's own success or failure.
    pub async fn fetch_loaded_models(
        &self,
        instances: &[Instance],
    ) -> Vec<SourceResult<Vec<ModelEntry>>> {
        self.fan_out(instances, Fetch::Loaded).await
    }

    async fn fan_out(
        &self,
        instances: &[Instance],
        fetch: Fetch,
    ) -> Vec<SourceResult<Vec<ModelEntry>>> {
        let (path, timeout) = match fetch {
            Fetch::Installed => (&self.config.tags_path, self.config.tags_timeout()),
            Fetch::Loaded => (&self.config.running_path, self.config.running_timeout()),
        };

        let queries = instances.iter().map(|instance| async move {
            let outcome = self.fetch_models(instance, path, timeout).await;
            SourceResult {
                instance: instance.clone(),
                outcome,
            }
        });
        join_all(queries).await
    }

    async fn fetch_models(
        &self,
        instance: &Instance,
        path: &str,
        timeout: Duration,
    ) -> Result<Vec<ModelEntry>, InstanceError> {
        let timeout_ms = timeout.as_millis() as u64;
        let response = self
            .client
            .get(instance.url(path))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| InstanceError::classify(e, timeout_ms))?;

        if !response.status().is_success() {
            return Err(InstanceError::Http(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| InstanceError::classify(e, timeout_ms))?;
        parse_model_list(&body, instance)
    }
}

#[derive(Debug, Clone, Copy)]
enum Fetch {
    Installed,
    Loaded,
}
