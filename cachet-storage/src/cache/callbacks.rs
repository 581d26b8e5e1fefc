//! Validation and retrieval callbacks.
//!
//! Callers plug behavior into a bulk operation through two traits:
//! [`ValidateCallback`] decides whether an existing cached value is still
//! acceptable, and [`RetrieveCallback`] fetches values from the backing
//! source for a set of keys. Closure adapters let plain async (or sync)
//! functions fill either slot.
//!
//! [`SingletonRetrieve`] adapts a bulk retriever to the single-key
//! [`FallbackRetrieve`] shape used by the per-key accessor.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cachet_core::{BulkKey, CacheableValue, CachetResult};

use super::cached_value::CachedValue;

/// Outcome of validating an existing cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    /// The cached value may be returned as a hit.
    Valid,
    /// Treat the cached value as absent for this operation. Does not evict.
    Invalid,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl From<bool> for ValidationResult {
    fn from(valid: bool) -> Self {
        if valid {
            Self::Valid
        } else {
            Self::Invalid
        }
    }
}

/// Revalidates an existing cached value before it is accepted.
#[async_trait]
pub trait ValidateCallback<T: CacheableValue>: Send + Sync {
    async fn validate(&self, cached: &CachedValue<T>) -> CachetResult<ValidationResult>;
}

/// Fetches values for a set of keys from the backing source.
///
/// The returned map may be a strict subset of `keys`: a missing entry means
/// "could not resolve" and is not an error. Iteration order of `keys` is
/// unspecified.
#[async_trait]
pub trait RetrieveCallback<K: BulkKey, T: CacheableValue>: Send + Sync {
    async fn retrieve(&self, keys: &HashSet<K>) -> CachetResult<HashMap<K, T>>;
}

/// Single-shot retrieval used by the single-key accessor on a miss.
#[async_trait]
pub trait FallbackRetrieve<T: CacheableValue>: Send + Sync {
    async fn retrieve_one(&self) -> CachetResult<Option<T>>;
}

#[async_trait]
impl<T, V> ValidateCallback<T> for Arc<V>
where
    T: CacheableValue,
    V: ValidateCallback<T> + ?Sized,
{
    async fn validate(&self, cached: &CachedValue<T>) -> CachetResult<ValidationResult> {
        (**self).validate(cached).await
    }
}

/// Lets a caller keep a handle on a retriever it hands to a bulk operation.
#[async_trait]
impl<K, T, R> RetrieveCallback<K, T> for Arc<R>
where
    K: BulkKey,
    T: CacheableValue,
    R: RetrieveCallback<K, T> + ?Sized,
{
    async fn retrieve(&self, keys: &HashSet<K>) -> CachetResult<HashMap<K, T>> {
        (**self).retrieve(keys).await
    }
}

// ============================================================================
// CLOSURE ADAPTERS
// ============================================================================

/// Async closure as a validator.
pub struct ValidateFn<F>(pub F);

#[async_trait]
impl<T, F, Fut> ValidateCallback<T> for ValidateFn<F>
where
    T: CacheableValue,
    F: Fn(CachedValue<T>) -> Fut + Send + Sync,
    Fut: Future<Output = CachetResult<ValidationResult>> + Send,
{
    async fn validate(&self, cached: &CachedValue<T>) -> CachetResult<ValidationResult> {
        (self.0)(cached.clone()).await
    }
}

/// Plain function as a validator. The call completes without yielding.
pub struct SyncValidateFn<F>(pub F);

#[async_trait]
impl<T, F> ValidateCallback<T> for SyncValidateFn<F>
where
    T: CacheableValue,
    F: Fn(&CachedValue<T>) -> ValidationResult + Send + Sync,
{
    async fn validate(&self, cached: &CachedValue<T>) -> CachetResult<ValidationResult> {
        Ok((self.0)(cached))
    }
}

/// Async closure as a retriever.
pub struct RetrieveFn<F>(pub F);

#[async_trait]
impl<K, T, F, Fut> RetrieveCallback<K, T> for RetrieveFn<F>
where
    K: BulkKey,
    T: CacheableValue,
    F: Fn(HashSet<K>) -> Fut + Send + Sync,
    Fut: Future<Output = CachetResult<HashMap<K, T>>> + Send,
{
    async fn retrieve(&self, keys: &HashSet<K>) -> CachetResult<HashMap<K, T>> {
        (self.0)(keys.clone()).await
    }
}

// ============================================================================
// BULK -> SINGLE-KEY ADAPTER
// ============================================================================

/// Presents a bulk retriever as a single-key fallback for one key.
///
/// Calls the retriever with the singleton set `{key}` and keeps only that
/// key's entry. The retriever is invoked at most once per adapter; later
/// calls return `None` without touching it.
pub struct SingletonRetrieve<'a, K, T>
where
    K: BulkKey,
    T: CacheableValue,
{
    retriever: &'a dyn RetrieveCallback<K, T>,
    key: K,
    invoked: AtomicBool,
}

impl<'a, K, T> SingletonRetrieve<'a, K, T>
where
    K: BulkKey,
    T: CacheableValue,
{
    pub fn new(retriever: &'a dyn RetrieveCallback<K, T>, key: K) -> Self {
        Self {
            retriever,
            key,
            invoked: AtomicBool::new(false),
        }
    }

    /// Whether the key has been offered to the retriever.
    pub fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<'a, K, T> FallbackRetrieve<T> for SingletonRetrieve<'a, K, T>
where
    K: BulkKey,
    T: CacheableValue,
{
    async fn retrieve_one(&self) -> CachetResult<Option<T>> {
        if self.invoked.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        let keys = HashSet::from([self.key.clone()]);
        let mut found = self.retriever.retrieve(&keys).await?;
        Ok(found.remove(&self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::{CachetError, ItemKey, Region};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRetriever {
        calls: AtomicUsize,
        offered: Mutex<Vec<HashSet<u32>>>,
    }

    #[async_trait]
    impl RetrieveCallback<u32, String> for CountingRetriever {
        async fn retrieve(&self, keys: &HashSet<u32>) -> CachetResult<HashMap<u32, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.offered.lock().unwrap().push(keys.clone());
            // Resolves even keys only, and always adds an unrelated entry.
            let mut out: HashMap<u32, String> = keys
                .iter()
                .filter(|k| *k % 2 == 0)
                .map(|k| (*k, format!("v{k}")))
                .collect();
            out.insert(999, "stray".to_string());
            Ok(out)
        }
    }

    fn cached(value: &str) -> CachedValue<String> {
        CachedValue::from_retrieval(
            value.to_string(),
            ItemKey::derive("user", &1),
            Region::default(),
        )
    }

    #[test]
    fn test_validation_result_from_bool() {
        assert_eq!(ValidationResult::from(true), ValidationResult::Valid);
        assert_eq!(ValidationResult::from(false), ValidationResult::Invalid);
        assert!(ValidationResult::Valid.is_valid());
        assert!(!ValidationResult::Invalid.is_valid());
    }

    #[tokio::test]
    async fn test_singleton_retrieve_offers_only_its_key() {
        let retriever = CountingRetriever::default();
        let adapter: SingletonRetrieve<'_, u32, String> = SingletonRetrieve::new(&retriever, 4);

        assert!(!adapter.was_invoked());
        let value = adapter.retrieve_one().await.unwrap();

        assert_eq!(value, Some("v4".to_string()));
        assert!(adapter.was_invoked());
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            retriever.offered.lock().unwrap()[0],
            HashSet::from([4u32])
        );
    }

    #[tokio::test]
    async fn test_singleton_retrieve_absent_key_is_none() {
        let retriever = CountingRetriever::default();
        let adapter: SingletonRetrieve<'_, u32, String> = SingletonRetrieve::new(&retriever, 3);

        assert_eq!(adapter.retrieve_one().await.unwrap(), None);
        assert!(adapter.was_invoked());
    }

    #[tokio::test]
    async fn test_singleton_retrieve_calls_at_most_once() {
        let retriever = CountingRetriever::default();
        let adapter: SingletonRetrieve<'_, u32, String> = SingletonRetrieve::new(&retriever, 2);

        assert!(adapter.retrieve_one().await.unwrap().is_some());
        assert_eq!(adapter.retrieve_one().await.unwrap(), None);
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_singleton_retrieve_propagates_errors() {
        let failing = RetrieveFn(|_keys: HashSet<u32>| async {
            Err::<HashMap<u32, String>, _>(CachetError::retrieval("backend down"))
        });
        let adapter: SingletonRetrieve<'_, u32, String> = SingletonRetrieve::new(&failing, 1);

        let err = adapter.retrieve_one().await.unwrap_err();
        assert_eq!(err, CachetError::retrieval("backend down"));
        assert!(adapter.was_invoked());
    }

    #[tokio::test]
    async fn test_sync_and_async_validators_agree() {
        let sync =
            SyncValidateFn(|v: &CachedValue<String>| ValidationResult::from(v.value().len() > 1));
        let async_fn = ValidateFn(|v: CachedValue<String>| async move {
            Ok::<_, CachetError>(ValidationResult::from(v.value().len() > 1))
        });

        for input in ["", "a", "ab", "abc"] {
            let value = cached(input);
            assert_eq!(
                sync.validate(&value).await.unwrap(),
                async_fn.validate(&value).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_retrieve_fn_passes_keys_through() {
        let retriever = RetrieveFn(|keys: HashSet<u32>| async move {
            Ok::<_, CachetError>(
                keys.into_iter()
                    .map(|k| (k, k * 10))
                    .collect::<HashMap<u32, u32>>(),
            )
        });

        let out = retriever.retrieve(&HashSet::from([1, 2])).await.unwrap();
        assert_eq!(out, HashMap::from([(1, 10), (2, 20)]));
    }
}
