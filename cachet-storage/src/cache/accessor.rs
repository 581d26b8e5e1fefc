//! Single-key read-through accessor.
//!
//! Resolves one item key against a cache port: cache first, optional
//! revalidation, then an optional single-shot fallback whose result is
//! written back through the port.

use std::sync::Arc;

use cachet_core::{CacheableValue, CachetResult, Expiration, ItemKey, Region};

use super::cached_value::CachedValue;
use super::callbacks::{FallbackRetrieve, ValidateCallback};
use super::traits::CachePort;

/// Read-through accessor bound to one cache port and region.
///
/// # Example
///
/// ```ignore
/// let accessor = SingleKeyAccessor::new(port, Region::new("users"), Expiration::Never);
/// let cached = accessor.resolve(&ItemKey::derive("user", &7), None, Some(&fallback)).await?;
/// ```
pub struct SingleKeyAccessor<T: CacheableValue> {
    port: Arc<dyn CachePort<T>>,
    region: Region,
    expiration: Expiration,
}

impl<T: CacheableValue> SingleKeyAccessor<T> {
    /// Create an accessor. `expiration` applies to values stored after a
    /// fallback retrieval.
    pub fn new(port: Arc<dyn CachePort<T>>, region: Region, expiration: Expiration) -> Self {
        Self {
            port,
            region,
            expiration,
        }
    }

    /// Resolve a single item key.
    ///
    /// - A cached entry is returned as a hit unless `validate` marks it
    ///   `Invalid`, in which case it is treated as absent (not evicted).
    /// - On a miss, `fallback` is asked once; a value it yields is stored
    ///   through the port and returned as retrieved.
    ///
    /// Returns `Ok(None)` when nothing usable is cached and the fallback is
    /// missing or yields nothing. Errors from the port or callbacks propagate.
    pub async fn resolve(
        &self,
        item_key: &ItemKey,
        validate: Option<&dyn ValidateCallback<T>>,
        fallback: Option<&dyn FallbackRetrieve<T>>,
    ) -> CachetResult<Option<CachedValue<T>>> {
        if let Some((value, cached_at)) = self.port.get(item_key, &self.region).await? {
            let cached =
                CachedValue::from_cache(value, item_key.clone(), self.region.clone(), cached_at);

            let accepted = match validate {
                Some(validator) => validator.validate(&cached).await?.is_valid(),
                None => true,
            };

            if accepted {
                tracing::trace!(item_key = %item_key, "Cache hit");
                return Ok(Some(cached));
            }
            tracing::trace!(item_key = %item_key, "Cached value rejected by validator");
        }

        let Some(fallback) = fallback else {
            return Ok(None);
        };

        match fallback.retrieve_one().await? {
            Some(value) => {
                let stored = self
                    .port
                    .set(item_key, &self.region, value, self.expiration)
                    .await?;
                tracing::trace!(item_key = %item_key, "Cache miss filled by fallback");
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::callbacks::{SyncValidateFn, ValidationResult};
    use crate::cache::memory::InMemoryCachePort;
    use async_trait::async_trait;
    use cachet_core::CachetError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedFallback {
        value: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FixedFallback {
        fn new(value: Option<&'static str>) -> Self {
            Self {
                value,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FallbackRetrieve<String> for FixedFallback {
        async fn retrieve_one(&self) -> CachetResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.map(str::to_string))
        }
    }

    struct FailingFallback;

    #[async_trait]
    impl FallbackRetrieve<String> for FailingFallback {
        async fn retrieve_one(&self) -> CachetResult<Option<String>> {
            Err(CachetError::retrieval("backend down"))
        }
    }

    async fn seeded_port(pairs: &[(&str, &str)]) -> Arc<InMemoryCachePort<String>> {
        let port = Arc::new(InMemoryCachePort::new());
        for (key, value) in pairs {
            port.set(
                &ItemKey::from_raw(*key),
                &Region::new("R"),
                value.to_string(),
                Expiration::Never,
            )
            .await
            .unwrap();
        }
        port
    }

    fn accessor(port: Arc<InMemoryCachePort<String>>) -> SingleKeyAccessor<String> {
        SingleKeyAccessor::new(port, Region::new("R"), Expiration::Never)
    }

    #[tokio::test]
    async fn test_hit_skips_fallback() {
        let port = seeded_port(&[("user:1", "A")]).await;
        let fallback = FixedFallback::new(Some("X"));

        let cached = accessor(port)
            .resolve(&ItemKey::from_raw("user:1"), None, Some(&fallback))
            .await
            .unwrap()
            .unwrap();

        assert!(cached.was_hit());
        assert_eq!(cached.value(), "A");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_without_fallback_is_none() {
        let port = seeded_port(&[]).await;
        let resolved = accessor(port)
            .resolve(&ItemKey::from_raw("user:1"), None, None)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_miss_fills_and_stores() {
        let port = seeded_port(&[]).await;
        let fallback = FixedFallback::new(Some("C"));

        let cached = accessor(Arc::clone(&port))
            .resolve(&ItemKey::from_raw("user:3"), None, Some(&fallback))
            .await
            .unwrap()
            .unwrap();

        assert!(cached.was_retrieved());
        assert_eq!(cached.value(), "C");
        let stored = port
            .get(&ItemKey::from_raw("user:3"), &Region::new("R"))
            .await
            .unwrap();
        assert_eq!(stored.map(|(v, _)| v), Some("C".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_value_falls_through_without_eviction() {
        let port = seeded_port(&[("user:1", "stale")]).await;
        let reject = SyncValidateFn(|_: &CachedValue<String>| ValidationResult::Invalid);

        let resolved = accessor(Arc::clone(&port))
            .resolve(&ItemKey::from_raw("user:1"), Some(&reject), None)
            .await
            .unwrap();

        assert!(resolved.is_none());
        assert_eq!(port.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_value_replaced_by_fallback() {
        let port = seeded_port(&[("user:1", "stale")]).await;
        let reject = SyncValidateFn(|_: &CachedValue<String>| ValidationResult::Invalid);
        let fallback = FixedFallback::new(Some("fresh"));

        let cached = accessor(Arc::clone(&port))
            .resolve(&ItemKey::from_raw("user:1"), Some(&reject), Some(&fallback))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cached.value(), "fresh");
        assert!(cached.was_retrieved());
    }

    #[tokio::test]
    async fn test_fallback_error_propagates() {
        let port = seeded_port(&[]).await;
        let err = accessor(port)
            .resolve(&ItemKey::from_raw("user:1"), None, Some(&FailingFallback))
            .await
            .unwrap_err();
        assert_eq!(err, CachetError::retrieval("backend down"));
    }
}
