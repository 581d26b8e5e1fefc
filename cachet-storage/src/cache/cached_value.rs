//! Resolved cache values and their metadata.

use cachet_core::{ItemKey, Region, Timestamp};
use chrono::Utc;
use std::time::Duration;

/// Where a [`CachedValue`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Found in the cache port (and accepted by the validator, if any).
    Hit,
    /// Fetched through a retrieval callback and written to the port.
    Retrieved,
}

/// A resolved value together with the cache metadata it was resolved under.
///
/// Immutable once built: there are accessors but no setters. Use
/// [`map`](Self::map) or [`into_value`](Self::into_value) to take the value out.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    value: T,
    item_key: ItemKey,
    region: Region,
    origin: CacheOrigin,
    cached_at: Timestamp,
}

impl<T> CachedValue<T> {
    /// Wrap a value read from the cache port.
    pub fn from_cache(value: T, item_key: ItemKey, region: Region, cached_at: Timestamp) -> Self {
        Self {
            value,
            item_key,
            region,
            origin: CacheOrigin::Hit,
            cached_at,
        }
    }

    /// Wrap a value that was just retrieved and stored.
    pub fn from_retrieval(value: T, item_key: ItemKey, region: Region) -> Self {
        Self {
            value,
            item_key,
            region,
            origin: CacheOrigin::Retrieved,
            cached_at: Utc::now(),
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn item_key(&self) -> &ItemKey {
        &self.item_key
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn origin(&self) -> CacheOrigin {
        self.origin
    }

    /// When the value was written to the cache port.
    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    pub fn was_hit(&self) -> bool {
        self.origin == CacheOrigin::Hit
    }

    pub fn was_retrieved(&self) -> bool {
        self.origin == CacheOrigin::Retrieved
    }

    /// Time since the value was cached. Zero if the timestamp is in the future.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> CachedValue<U>
    where
        F: FnOnce(T) -> U,
    {
        CachedValue {
            value: f(self.value),
            item_key: self.item_key,
            region: self.region,
            origin: self.origin,
            cached_at: self.cached_at,
        }
    }
}
