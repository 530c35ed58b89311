//! In-flight request accounting.
//!
//! Counts requests currently executing, keyed by instance and by model.
//! Every [`InFlightTracker::begin`] returns a guard whose release is
//! idempotent and also runs on drop, so each increment is matched by
//! exactly one decrement on every exit path.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What a tracked request runs against. Either half may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InFlightKey {
    pub instance_id: Option<u32>,
    pub model: Option<String>,
}

impl InFlightKey {
    pub fn new(instance_id: Option<u32>, model: Option<&str>) -> Self {
        Self {
            instance_id,
            model: model.map(str::to_string),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InFlightSnapshot {
    /// Sum of the per-instance counts
    pub total: u64,
    pub by_instance: BTreeMap<String, u64>,
    pub by_model: BTreeMap<String, u64>,
}

/// Process-wide in-flight counters.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    by_instance: DashMap<u32, u64>,
    by_model: DashMap<String, u64>,
    active: AtomicU64,
}

fn increment<K: Eq + Hash>(map: &DashMap<K, u64>, key: K) {
    *map.entry(key).or_insert(0) += 1;
}

fn decrement<K: Eq + Hash>(map: &DashMap<K, u64>, key: K) {
    if let Entry::Occupied(mut entry) = map.entry(key) {
        if *entry.get() <= 1 {
            entry.remove();
        } else {
            *entry.get_mut() -= 1;
        }
    }
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request as in flight until the returned guard is released.
    pub fn begin(self: &Arc<Self>, key: InFlightKey) -> InFlightGuard {
        if let Some(id) = key.instance_id {
            increment(&self.by_instance, id);
        }
        if let Some(model) = &key.model {
            increment(&self.by_model, model.clone());
        }
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("ollamify_in_flight_requests").set(active as f64);

        InFlightGuard {
            tracker: Arc::clone(self),
            key,
            released: AtomicBool::new(false),
        }
    }

    fn end(&self, key: &InFlightKey) {
        if let Some(id) = key.instance_id {
            decrement(&self.by_instance, id);
        }
        if let Some(model) = &key.model {
            decrement(&self.by_model, model.clone());
        }
        let active = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("ollamify_in_flight_requests").set(active as f64);
    }

    pub fn snapshot(&self) -> InFlightSnapshot {
        let by_instance: BTreeMap<String, u64> = self
            .by_instance
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();
        let by_model = self
            .by_model
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        InFlightSnapshot {
            total: by_instance.values().sum(),
            by_instance,
            by_model,
        }
    }

    /// Count for one instance (0 when absent).
    pub fn for_instance(&self, instance_id: u32) -> u64 {
        self.by_instance
            .get(&instance_id)
            .map(|count| *count)
            .unwrap_or(0)
    }
}

/// Release token for one in-flight request.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlightTracker>,
    key: InFlightKey,
    released: AtomicBool,
}

impl InFlightGuard {
    /// Decrement the counters. Later calls are no-ops.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.tracker.end(&self.key);
        }
    }

    pub fn key(&self) -> &InFlightKey {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.release();
    }
}
