//! cachet Test Utilities
//!
//! Centralized test infrastructure for the cachet workspace:
//! - Proptest generators for keys and cache layouts
//! - Recording callbacks that remember every key they were offered
//! - Fixtures for seeded in-memory ports

// Re-export core types for convenience
pub use cachet_core::{
    BulkCacheConfig, CacheError, CachetError, CachetResult, Expiration, FillMode, ItemKey, Region,
};
pub use cachet_storage::{
    BulkGet, CachePort, CachedValue, InMemoryCachePort, RetrieveCallback, ValidateCallback,
    ValidationResult,
};

use async_trait::async_trait;
use cachet_core::{BulkKey, CacheableValue};
use cachet_storage::{init_tracing, TelemetryConfig};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// ============================================================================
// RECORDING CALLBACKS
// ============================================================================

/// Retriever backed by a fixed map. Records every key set it is offered so
/// tests can assert how often each key reached the backing source.
#[derive(Debug)]
pub struct RecordingRetriever<K, T> {
    backing: HashMap<K, T>,
    calls: Mutex<Vec<HashSet<K>>>,
    fail_with: Option<CachetError>,
}

impl<K: BulkKey, T: CacheableValue> RecordingRetriever<K, T> {
    pub fn new(backing: impl IntoIterator<Item = (K, T)>) -> Arc<Self> {
        Arc::new(Self {
            backing: backing.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
            fail_with: None,
        })
    }

    /// A retriever that records the call, then fails with `error`.
    pub fn failing(error: CachetError) -> Arc<Self> {
        Arc::new(Self {
            backing: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            fail_with: Some(error),
        })
    }

    /// Every key set offered, in call order.
    pub fn calls(&self) -> Vec<HashSet<K>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// How many calls included `key`.
    pub fn times_offered(&self, key: &K) -> usize {
        self.calls().iter().filter(|set| set.contains(key)).count()
    }

    /// Calls that offered more than one key.
    pub fn bulk_calls(&self) -> usize {
        self.calls().iter().filter(|set| set.len() > 1).count()
    }
}

#[async_trait]
impl<K: BulkKey, T: CacheableValue> RetrieveCallback<K, T> for RecordingRetriever<K, T> {
    async fn retrieve(&self, keys: &HashSet<K>) -> CachetResult<HashMap<K, T>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(keys.clone());
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(keys
            .iter()
            .filter_map(|key| self.backing.get(key).map(|v| (key.clone(), v.clone())))
            .collect())
    }
}

/// Validator that rejects values whose item key is in a fixed set and
/// counts how many values it saw.
#[derive(Debug, Default)]
pub struct RejectingValidator {
    reject: HashSet<ItemKey>,
    seen: Mutex<Vec<ItemKey>>,
}

impl RejectingValidator {
    pub fn new(reject: impl IntoIterator<Item = ItemKey>) -> Arc<Self> {
        Arc::new(Self {
            reject: reject.into_iter().collect(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<ItemKey> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl<T: CacheableValue> ValidateCallback<T> for RejectingValidator {
    async fn validate(&self, cached: &CachedValue<T>) -> CachetResult<ValidationResult> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(cached.item_key().clone());
        }
        Ok(ValidationResult::from(!self.reject.contains(cached.item_key())))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// An in-memory port pre-loaded with `pairs` under `base_key` in `region`.
pub async fn seeded_port<K, T>(
    base_key: &str,
    region: &Region,
    pairs: impl IntoIterator<Item = (K, T)>,
) -> CachetResult<Arc<InMemoryCachePort<T>>>
where
    K: BulkKey,
    T: CacheableValue,
{
    let port = Arc::new(InMemoryCachePort::new());
    for (key, value) in pairs {
        port.set(
            &ItemKey::derive(base_key, &key),
            region,
            value,
            Expiration::Never,
        )
        .await?;
    }
    Ok(port)
}

/// Install a tracing subscriber for integration tests. Safe to call from
/// every test; only the first call installs anything.
pub fn init_test_tracing() {
    let config = TelemetryConfig::default().with_filter("cachet_storage=debug,warn");
    // A second install fails by design; the first one is what we want.
    let _ = init_tracing(&config);
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for bulk get scenarios.

    use super::*;
    use proptest::prelude::*;

    /// What the world looks like for one key before a bulk get.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum KeyState {
        /// Cached and accepted by the validator.
        Cached,
        /// Cached but rejected by the validator.
        Rejected,
        /// Not cached, backing source has it.
        Retrievable,
        /// Not cached, backing source does not have it.
        Unresolvable,
    }

    /// A bulk get scenario: keys in request order, each with its state.
    #[derive(Debug, Clone)]
    pub struct Scenario {
        pub keys: Vec<(u32, KeyState)>,
    }

    impl Scenario {
        pub fn key_list(&self) -> Vec<u32> {
            self.keys.iter().map(|(k, _)| *k).collect()
        }

        pub fn with_state(&self, state: KeyState) -> Vec<u32> {
            self.keys
                .iter()
                .filter(|(_, s)| *s == state)
                .map(|(k, _)| *k)
                .collect()
        }

        /// Keys seeded into the cache, rejected ones included.
        pub fn cached_pairs(&self) -> Vec<(u32, String)> {
            self.keys
                .iter()
                .filter(|(_, s)| matches!(s, KeyState::Cached | KeyState::Rejected))
                .map(|(k, _)| (*k, cached_value(*k)))
                .collect()
        }

        /// What the backing source knows. Rejected keys are retrievable too.
        pub fn backing_pairs(&self) -> Vec<(u32, String)> {
            self.keys
                .iter()
                .filter(|(_, s)| matches!(s, KeyState::Retrievable | KeyState::Rejected))
                .map(|(k, _)| (*k, backing_value(*k)))
                .collect()
        }
    }

    pub fn cached_value(key: u32) -> String {
        format!("cached-{key}")
    }

    pub fn backing_value(key: u32) -> String {
        format!("backing-{key}")
    }

    /// Generate a KeyState variant.
    pub fn arb_key_state() -> impl Strategy<Value = KeyState> {
        prop_oneof![
            Just(KeyState::Cached),
            Just(KeyState::Rejected),
            Just(KeyState::Retrievable),
            Just(KeyState::Unresolvable),
        ]
    }

    /// Generate a KeyState that needs no validator.
    pub fn arb_unvalidated_key_state() -> impl Strategy<Value = KeyState> {
        prop_oneof![
            Just(KeyState::Cached),
            Just(KeyState::Retrievable),
            Just(KeyState::Unresolvable),
        ]
    }

    /// Generate a scenario of up to `max_keys` distinct keys.
    pub fn arb_scenario(max_keys: usize) -> impl Strategy<Value = Scenario> {
        scenario_from(arb_key_state(), max_keys)
    }

    /// Generate a scenario with no rejected keys.
    pub fn arb_unvalidated_scenario(max_keys: usize) -> impl Strategy<Value = Scenario> {
        scenario_from(arb_unvalidated_key_state(), max_keys)
    }

    fn scenario_from(
        state: impl Strategy<Value = KeyState>,
        max_keys: usize,
    ) -> impl Strategy<Value = Scenario> {
        prop::collection::hash_map(0u32..10_000, state, 0..=max_keys)
            .prop_flat_map(|states| {
                let entries: Vec<(u32, KeyState)> = states.into_iter().collect();
                Just(entries).prop_shuffle()
            })
            .prop_map(|keys| Scenario { keys })
    }

    /// Generate a fill mode.
    pub fn arb_fill_mode() -> impl Strategy<Value = FillMode> {
        prop_oneof![Just(FillMode::PerKey), Just(FillMode::Batched)]
    }
}
