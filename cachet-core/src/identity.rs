//! Identity types for cached entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier for a single bulk operation, used to correlate log events.
/// UUIDv7 so that ids sort by start time.
pub type OperationId = Uuid;

/// Generate a new UUIDv7 OperationId (timestamp-sortable).
pub fn new_operation_id() -> OperationId {
    Uuid::now_v7()
}

/// Bounds for a domain key handed to a bulk operation.
///
/// Keys must support equality and hashing for miss-set bookkeeping, and
/// `Display` so an [`ItemKey`] can be derived from them.
pub trait BulkKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {}

impl<K> BulkKey for K where
    K: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static
{
}

/// Bounds for a value that can live in a cache port.
pub trait CacheableValue: Clone + Send + Sync + 'static {}

impl<T> CacheableValue for T where T: Clone + Send + Sync + 'static {}

/// Namespace passed through to the cache port alongside the item key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Region {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Region {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Separator between the base key and the domain key.
const ITEM_KEY_SEPARATOR: char = ':';

/// Fully-qualified key addressing a single cached entry.
///
/// Built from a caller-supplied base key and a domain key, so the same
/// domain key under two base keys never collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Derive the item key for `key` under `base_key`.
    ///
    /// Format: `{base_key}:{key}`.
    pub fn derive<K: fmt::Display + ?Sized>(base_key: &str, key: &K) -> Self {
        Self(format!("{base_key}{ITEM_KEY_SEPARATOR}{key}"))
    }

    /// Wrap an already fully-qualified key.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The base key portion (everything before the first separator).
    pub fn base_key(&self) -> Option<&str> {
        self.0.split_once(ITEM_KEY_SEPARATOR).map(|(base, _)| base)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expiration policy applied when a value is written to a cache port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Expiration {
    /// Entry never expires; eviction is left to the store.
    #[default]
    Never,
    /// Entry expires this long after it was written.
    After(Duration),
    /// Entry expires at a fixed instant.
    At(Timestamp),
}

impl Expiration {
    /// Expire `secs` seconds after write. Zero means never.
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::Never
        } else {
            Self::After(Duration::from_secs(secs))
        }
    }

    /// Absolute expiry instant for an entry written at `written_at`.
    pub fn expires_at(&self, written_at: Timestamp) -> Option<Timestamp> {
        match self {
            Self::Never => None,
            Self::After(ttl) => {
                let ttl = chrono::Duration::from_std(*ttl).unwrap_or(chrono::Duration::MAX);
                Some(written_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
            }
            Self::At(at) => Some(*at),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_derive_joins_base_and_key() {
        let key = ItemKey::derive("user", &3);
        assert_eq!(key.as_str(), "user:3");
        assert_eq!(key.base_key(), Some("user"));
    }

    #[test]
    fn test_item_key_distinct_per_base() {
        assert_ne!(ItemKey::derive("user", &1), ItemKey::derive("org", &1));
    }

    #[test]
    fn test_region_default_and_display() {
        assert_eq!(Region::default().as_str(), "default");
        assert_eq!(Region::from("R").to_string(), "R");
    }

    #[test]
    fn test_expiration_from_secs_zero_is_never() {
        assert!(Expiration::from_secs(0).is_never());
        assert_eq!(
            Expiration::from_secs(30),
            Expiration::After(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_expiration_expires_at() {
        let now = Utc::now();
        assert_eq!(Expiration::Never.expires_at(now), None);
        assert_eq!(
            Expiration::After(Duration::from_secs(10)).expires_at(now),
            Some(now + chrono::Duration::seconds(10))
        );
        let fixed = now + chrono::Duration::hours(1);
        assert_eq!(Expiration::At(fixed).expires_at(now), Some(fixed));
    }

    #[test]
    fn test_expiration_huge_ttl_saturates() {
        let now = Utc::now();
        let at = Expiration::After(Duration::MAX).expires_at(now);
        assert!(at.is_some());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn base_key_strategy() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,15}"
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            /// Distinct domain keys under one base key never share an item key.
            #[test]
            fn prop_derive_is_injective(
                base in base_key_strategy(),
                a in any::<u64>(),
                b in any::<u64>(),
            ) {
                prop_assume!(a != b);
                prop_assert_ne!(ItemKey::derive(&base, &a), ItemKey::derive(&base, &b));
            }

            /// The base key survives derivation when it has no separator.
            #[test]
            fn prop_base_key_recovered(base in base_key_strategy(), key in any::<u32>()) {
                let item_key = ItemKey::derive(&base, &key);
                prop_assert_eq!(item_key.base_key(), Some(base.as_str()));
            }

            /// A relative expiration never lands before the write.
            #[test]
            fn prop_ttl_expiry_not_before_write(secs in 1u64..=u64::MAX) {
                let now = Utc::now();
                let expires = Expiration::from_secs(secs).expires_at(now);
                prop_assert!(expires.is_some_and(|at| at > now));
            }
        }
    }
}
