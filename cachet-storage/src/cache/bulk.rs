//! Bulk get: reconcile many keys against a cache port in two phases.
//!
//! Phase 1 walks the keys in order and resolves each through a
//! [`SingleKeyAccessor`]. Phase 2 hands whatever is still missing to the
//! retrieval callback in one call and writes the results back through the
//! port.
//!
//! Invariants of one [`BulkGet::get_all`] call:
//! - every returned value belongs to exactly one requested key, and no key
//!   appears twice;
//! - no key is offered to the retrieval callback more than once;
//! - keys nobody can resolve are left out of the result, silently.
//!
//! Results are Phase 1 resolutions in key order followed by Phase 2 fills,
//! so in batched mode the output order differs from the input order
//! whenever a miss is filled.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cachet_core::{
    new_operation_id, BulkCacheConfig, BulkKey, CacheError, CacheableValue, CachetError,
    CachetResult, Expiration, FillMode, ItemKey, Region,
};
use tracing::Instrument;

use super::accessor::SingleKeyAccessor;
use super::cached_value::CachedValue;
use super::callbacks::{
    FallbackRetrieve, RetrieveCallback, RetrieveFn, SingletonRetrieve, SyncValidateFn,
    ValidateCallback, ValidateFn, ValidationResult,
};
use super::traits::CachePort;

/// A configured bulk get over a fixed key collection.
///
/// Built incrementally. Each callback setter replaces whatever was set
/// before for that slot: the last call wins and callbacks are never
/// composed. Nothing checks for a repeated call.
///
/// # Example
///
/// ```ignore
/// let users = BulkGet::new(port, "user", Region::new("R"), [1, 2, 3])
///     .invalidate_if_sync(|cached| cached.age() < Duration::from_secs(300))
///     .retrieve_with(|missing| async move { db.load_users(missing).await })
///     .get_all_values()
///     .await?;
/// ```
pub struct BulkGet<K, T>
where
    K: BulkKey,
    T: CacheableValue,
{
    port: Arc<dyn CachePort<T>>,
    base_key: String,
    region: Region,
    keys: Vec<K>,
    validator: Option<Arc<dyn ValidateCallback<T>>>,
    retriever: Option<Arc<dyn RetrieveCallback<K, T>>>,
    expiration: Expiration,
    fill_mode: FillMode,
    timeout: Option<Duration>,
}

impl<K, T> BulkGet<K, T>
where
    K: BulkKey,
    T: CacheableValue,
{
    /// Describe a bulk get over `keys` with no callbacks, no expiration and
    /// the default fill mode.
    pub fn new(
        port: Arc<dyn CachePort<T>>,
        base_key: impl Into<String>,
        region: impl Into<Region>,
        keys: impl IntoIterator<Item = K>,
    ) -> Self {
        Self {
            port,
            base_key: base_key.into(),
            region: region.into(),
            keys: keys.into_iter().collect(),
            validator: None,
            retriever: None,
            expiration: Expiration::Never,
            fill_mode: FillMode::default(),
            timeout: None,
        }
    }

    /// Describe a bulk get using the region, expiration, fill mode and
    /// timeout from `config`.
    pub fn from_config(
        port: Arc<dyn CachePort<T>>,
        base_key: impl Into<String>,
        keys: impl IntoIterator<Item = K>,
        config: &BulkCacheConfig,
    ) -> Self {
        let mut bulk = Self::new(port, base_key, config.default_region.clone(), keys)
            .expiration(config.default_expiration)
            .fill_mode(config.fill_mode);
        bulk.timeout = config.operation_timeout;
        bulk
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Set the validator. Replaces any previous validator.
    pub fn validate<V>(mut self, validator: V) -> Self
    where
        V: ValidateCallback<T> + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Set an async closure as the validator.
    pub fn validate_with<F, Fut>(self, validate: F) -> Self
    where
        F: Fn(CachedValue<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CachetResult<ValidationResult>> + Send + 'static,
    {
        self.validate(ValidateFn(validate))
    }

    /// Set a plain function as the validator.
    ///
    /// Behaves exactly like [`validate_with`](Self::validate_with) given the
    /// same function; it only skips the future.
    pub fn validate_sync<F>(self, validate: F) -> Self
    where
        F: Fn(&CachedValue<T>) -> ValidationResult + Send + Sync + 'static,
    {
        self.validate(SyncValidateFn(validate))
    }

    /// Set the validator from an async predicate: `true` maps to
    /// [`ValidationResult::Valid`], `false` to [`ValidationResult::Invalid`].
    pub fn invalidate_if<F, Fut>(self, predicate: F) -> Self
    where
        F: Fn(CachedValue<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CachetResult<bool>> + Send + 'static,
    {
        self.validate_with(move |cached| {
            let verdict = predicate(cached);
            async move { verdict.await.map(ValidationResult::from) }
        })
    }

    /// Synchronous form of [`invalidate_if`](Self::invalidate_if).
    pub fn invalidate_if_sync<F>(self, predicate: F) -> Self
    where
        F: Fn(&CachedValue<T>) -> bool + Send + Sync + 'static,
    {
        self.validate_sync(move |cached| ValidationResult::from(predicate(cached)))
    }

    /// Set the retriever. Replaces any previous retriever.
    pub fn retrieve_using<R>(mut self, retriever: R) -> Self
    where
        R: RetrieveCallback<K, T> + 'static,
    {
        self.retriever = Some(Arc::new(retriever));
        self
    }

    /// Set an async closure as the retriever.
    pub fn retrieve_with<F, Fut>(self, retrieve: F) -> Self
    where
        F: Fn(HashSet<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CachetResult<HashMap<K, T>>> + Send + 'static,
    {
        self.retrieve_using(RetrieveFn(retrieve))
    }

    /// Expiration applied to values written after a retrieval.
    pub fn expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Bound the whole operation. On expiry `get_all` fails with
    /// [`CacheError::Timeout`]; writes already made stay in the port.
    ///
    /// The bound is enforced with `tokio::time::timeout`, so `get_all` must
    /// run on a tokio runtime with the time driver enabled (`enable_time` or
    /// `enable_all` on a hand-built runtime). Without it `get_all` panics.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn expiration_policy(&self) -> Expiration {
        self.expiration
    }

    pub fn fill_mode_policy(&self) -> FillMode {
        self.fill_mode
    }

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Resolve every key, returning one [`CachedValue`] per resolvable key.
    ///
    /// Errors from the port or from either callback abort the operation and
    /// propagate unchanged. A key that cannot be resolved is not an error;
    /// it is simply absent from the result.
    pub async fn get_all(&self) -> CachetResult<Vec<CachedValue<T>>> {
        let op_id = new_operation_id();
        let span = tracing::info_span!(
            "bulk_get",
            %op_id,
            region = %self.region,
            base_key = %self.base_key,
            keys = self.keys.len()
        );
        let run = self.reconcile().instrument(span);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                tracing::warn!(%op_id, timeout = ?limit, "Bulk get timed out");
                CachetError::from(CacheError::Timeout { elapsed: limit })
            })?,
            None => run.await,
        }
    }

    /// Same as [`get_all`](Self::get_all), projected to bare values in the
    /// same order.
    pub async fn get_all_values(&self) -> CachetResult<Vec<T>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .map(CachedValue::into_value)
            .collect())
    }

    async fn reconcile(&self) -> CachetResult<Vec<CachedValue<T>>> {
        let keys = self.working_keys();
        if keys.is_empty() {
            tracing::debug!("No keys requested");
            return Ok(Vec::new());
        }

        let accessor =
            SingleKeyAccessor::new(Arc::clone(&self.port), self.region.clone(), self.expiration);
        let per_key_retriever = match self.fill_mode {
            FillMode::PerKey => self.retriever.as_deref(),
            FillMode::Batched => None,
        };

        let mut results = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        let mut offered = HashSet::new();

        // Phase 1: per-key resolution, in key order.
        for key in keys {
            let item_key = ItemKey::derive(&self.base_key, &key);
            let fallback = per_key_retriever.map(|r| SingletonRetrieve::new(r, key.clone()));

            let resolved = accessor
                .resolve(
                    &item_key,
                    self.validator.as_deref(),
                    fallback.as_ref().map(|f| f as &dyn FallbackRetrieve<T>),
                )
                .await?;

            if fallback.as_ref().is_some_and(SingletonRetrieve::was_invoked) {
                offered.insert(key.clone());
            }

            match resolved {
                Some(cached) => {
                    tracing::trace!(%key, origin = ?cached.origin(), "Key resolved");
                    results.push(cached);
                }
                None => missing.push(key),
            }
        }

        let resolved_per_key = results.len();
        tracing::debug!(
            resolved = resolved_per_key,
            missing = missing.len(),
            offered = offered.len(),
            "Per-key pass complete"
        );

        // Phase 2: one bulk call for keys never offered to the retriever.
        let Some(retriever) = self.retriever.as_deref() else {
            return Ok(results);
        };
        let (pending, already_offered): (Vec<K>, Vec<K>) = missing
            .into_iter()
            .partition(|key| !offered.contains(key));

        if pending.is_empty() {
            tracing::debug!(dropped = already_offered.len(), "Nothing left for bulk fill");
            return Ok(results);
        }

        let filled = self.bulk_fill(retriever, &pending, &mut results).await?;
        tracing::debug!(
            requested = pending.len(),
            filled,
            dropped = already_offered.len() + (pending.len() - filled),
            "Bulk fill complete"
        );

        Ok(results)
    }

    /// Offer `pending` to the retriever once and store what comes back.
    /// Returns how many values were stored.
    async fn bulk_fill(
        &self,
        retriever: &dyn RetrieveCallback<K, T>,
        pending: &[K],
        results: &mut Vec<CachedValue<T>>,
    ) -> CachetResult<usize> {
        let request: HashSet<K> = pending.iter().cloned().collect();
        let mut fetched = retriever.retrieve(&request).await?;

        let unrequested = fetched.keys().filter(|key| !request.contains(key)).count();
        if unrequested > 0 {
            tracing::warn!(
                unrequested,
                "Retriever returned entries for keys that were not requested; ignoring them"
            );
        }

        let mut filled = 0;
        for key in pending {
            let Some(value) = fetched.remove(key) else {
                continue;
            };
            let item_key = ItemKey::derive(&self.base_key, key);
            let stored = self
                .port
                .set(&item_key, &self.region, value, self.expiration)
                .await?;
            results.push(stored);
            filled += 1;
        }

        Ok(filled)
    }

    /// Private copy of the keys with duplicates dropped, first occurrence kept.
    fn working_keys(&self) -> Vec<K> {
        let mut seen = HashSet::with_capacity(self.keys.len());
        self.keys
            .iter()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect()
    }
}
