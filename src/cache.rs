//! Single-slot time-to-live cache.
//!
//! Entries are idempotent recomputations, so concurrent population is
//! last-writer-wins. Locks are never held across an `.await`.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// A cached value and the time (epoch ms) it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub updated_at_ms: u64,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is younger than `ttl_ms` at `now_ms`.
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.updated_at_ms) < ttl_ms
    }
}

/// Cache holding at most one value with a fixed TTL.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl_ms: u64,
    slot: RwLock<Option<CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Value if present and younger than the TTL.
    pub fn get_fresh(&self, now_ms: u64) -> Option<T> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|entry| entry.is_fresh(now_ms, self.ttl_ms))
            .map(|entry| entry.value.clone())
    }

    /// Last stored entry regardless of age.
    pub fn last(&self) -> Option<CacheEntry<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn insert(&self, value: T, now_ms: u64) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(CacheEntry {
            value,
            updated_at_ms: now_ms,
        });
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
