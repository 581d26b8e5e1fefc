//! Cache port trait and statistics.
//!
//! This module defines the trait that must be implemented by cache stores
//! the bulk layer talks to.

use async_trait::async_trait;
use cachet_core::{CacheableValue, CachetResult, Expiration, ItemKey, Region, Timestamp};

use super::cached_value::CachedValue;

/// Cache port for pluggable cache stores.
///
/// This trait abstracts over different stores (in-memory, Redis, LMDB...).
/// Storage, eviction, expiration enforcement and region namespacing are the
/// store's business; the bulk layer only calls `get` and `set`.
///
/// Implementations should be thread-safe. Whether a `get` followed by a `set`
/// is atomic across concurrent callers is implementation-defined.
#[async_trait]
pub trait CachePort<T: CacheableValue>: Send + Sync {
    /// Get a value from the cache.
    ///
    /// Returns the cached value and when it was written, or None if the
    /// entry is absent or expired.
    async fn get(&self, item_key: &ItemKey, region: &Region)
        -> CachetResult<Option<(T, Timestamp)>>;

    /// Store a value under `item_key` in `region`.
    ///
    /// Returns the stored value wrapped with its metadata.
    async fn set(
        &self,
        item_key: &ItemKey,
        region: &Region,
        value: T,
        expiration: Expiration,
    ) -> CachetResult<CachedValue<T>>;

    /// Get cache statistics. Stores that do not track usage report zeros.
    async fn stats(&self) -> CachetResult<CacheStats> {
        Ok(CacheStats::default())
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (including expired entries).
    pub misses: u64,
    /// Number of values written.
    pub writes: u64,
    /// Number of entries dropped because they had expired.
    pub expirations: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
