//! In-memory cache port.
//!
//! A region-namespaced map guarded by a tokio `RwLock`. Expiration is
//! enforced lazily: an expired entry is reported as a miss and purged on the
//! read that finds it.
//!
//! # Thread Safety
//!
//! `get` takes a read lock, `set`/`remove`/`invalidate_region` take a write
//! lock. A `get` followed by a `set` from the same caller is NOT atomic;
//! two concurrent bulk operations over the same key may both retrieve it.
//! Statistics are tracked with atomic counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cachet_core::{CacheableValue, CachetResult, Expiration, ItemKey, Region, Timestamp};
use chrono::Utc;
use tokio::sync::RwLock;

use super::cached_value::CachedValue;
use super::traits::{CachePort, CacheStats};

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    cached_at: Timestamp,
    expires_at: Option<Timestamp>,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    expirations: AtomicU64,
}

/// In-memory cache port, keyed by `(region, item_key)`.
pub struct InMemoryCachePort<T> {
    entries: RwLock<HashMap<Region, HashMap<ItemKey, Entry<T>>>>,
    counters: Counters,
}

impl<T> Default for InMemoryCachePort<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }
}

impl<T: CacheableValue> InMemoryCachePort<T> {
    /// Create an empty port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn remove(&self, item_key: &ItemKey, region: &Region) -> bool {
        let mut entries = self.entries.write().await;
        entries
            .get_mut(region)
            .and_then(|items| items.remove(item_key))
            .is_some()
    }

    /// Drop every entry in a region. Returns how many were removed.
    pub async fn invalidate_region(&self, region: &Region) -> u64 {
        let mut entries = self.entries.write().await;
        entries
            .remove(region)
            .map(|items| items.len() as u64)
            .unwrap_or(0)
    }

    /// Number of stored entries across all regions, expired ones included
    /// until a read purges them.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn purge_if_expired(&self, item_key: &ItemKey, region: &Region) {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        if let Some(items) = entries.get_mut(region) {
            // Re-check under the write lock; a concurrent set may have refreshed it.
            if items.get(item_key).is_some_and(|entry| entry.is_expired(now)) {
                items.remove(item_key);
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl<T: CacheableValue> CachePort<T> for InMemoryCachePort<T> {
    async fn get(
        &self,
        item_key: &ItemKey,
        region: &Region,
    ) -> CachetResult<Option<(T, Timestamp)>> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(region).and_then(|items| items.get(item_key)) {
                Some(entry) if !entry.is_expired(Utc::now()) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some((entry.value.clone(), entry.cached_at)));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.purge_if_expired(item_key, region).await;
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(
        &self,
        item_key: &ItemKey,
        region: &Region,
        value: T,
        expiration: Expiration,
    ) -> CachetResult<CachedValue<T>> {
        let stored = CachedValue::from_retrieval(value, item_key.clone(), region.clone());
        let entry = Entry {
            value: stored.value().clone(),
            cached_at: stored.cached_at(),
            expires_at: expiration.expires_at(stored.cached_at()),
        };

        let mut entries = self.entries.write().await;
        entries
            .entry(region.clone())
            .or_default()
            .insert(item_key.clone(), entry);
        self.counters.writes.fetch_add(1, Ordering::Relaxed);

        Ok(stored)
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        let entry_count = self.len().await as u64;
        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            entry_count,
        })
    }
}
