//! cachet Storage - Cache Port and Bulk Get Orchestration
//!
//! Defines the cache port abstraction and the bulk get that reconciles
//! many keys against it. Concrete stores plug in through [`CachePort`];
//! an in-memory port ships for tests and local use.

pub mod cache;
pub mod telemetry;

// Re-export cache types for callers
pub use cache::{
    BulkGet, CacheOrigin, CachePort, CacheStats, CachedValue, FallbackRetrieve,
    InMemoryCachePort, RetrieveCallback, RetrieveFn, SingleKeyAccessor, SingletonRetrieve,
    SyncValidateFn, ValidateCallback, ValidateFn, ValidationResult,
};
pub use telemetry::{init_tracing, TelemetryConfig};

pub use cachet_core::{
    BulkCacheConfig, BulkKey, CacheError, CacheableValue, CachetError, CachetResult, ConfigError,
    Expiration, FillMode, ItemKey, Region, Timestamp,
};
