//! cachet Core - Identity, Error and Configuration Types
//!
//! Pure data structures shared by the cache layer. No I/O and no async
//! lives here; the orchestration logic is in `cachet-storage`.

pub mod config;
pub mod error;
pub mod identity;

pub use config::{BulkCacheConfig, FillMode};
pub use error::{CacheError, CachetError, CachetResult, ConfigError};
pub use identity::{
    new_operation_id, BulkKey, CacheableValue, Expiration, ItemKey, OperationId, Region, Timestamp,
};
