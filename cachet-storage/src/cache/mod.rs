//! Cache layer: a pluggable cache port and a bulk get that reconciles many
//! keys against it.
//!
//! # Design Philosophy
//!
//! The store itself (storage, eviction, expiration, regions) sits behind
//! [`CachePort`] and is injected, never global. On top of it:
//!
//! - [`SingleKeyAccessor`] resolves one key: cache, optional revalidation,
//!   optional single-shot fallback.
//! - [`BulkGet`] walks many keys through the accessor, then offers whatever
//!   is still missing to a bulk retriever in one call.
//!
//! An unresolvable key is not an error. It is simply absent from the
//! result, so callers must not assume one output per input.
//!
//! # Example
//!
//! ```ignore
//! let port: Arc<dyn CachePort<User>> = Arc::new(InMemoryCachePort::new());
//!
//! let users = BulkGet::new(port, "user", Region::new("accounts"), ids)
//!     .validate_sync(|cached| ValidationResult::from(!cached.value().disabled))
//!     .retrieve_with(move |missing| {
//!         let db = db.clone();
//!         async move { db.users_by_id(missing).await }
//!     })
//!     .expiration(Expiration::After(Duration::from_secs(600)))
//!     .get_all_values()
//!     .await?;
//! ```

pub mod accessor;
pub mod bulk;
pub mod cached_value;
pub mod callbacks;
pub mod memory;
pub mod traits;

pub use accessor::SingleKeyAccessor;
pub use bulk::BulkGet;
pub use cached_value::{CacheOrigin, CachedValue};
pub use callbacks::{
    FallbackRetrieve, RetrieveCallback, RetrieveFn, SingletonRetrieve, SyncValidateFn,
    ValidateCallback, ValidateFn, ValidationResult,
};
pub use memory::InMemoryCachePort;
pub use traits::{CachePort, CacheStats};
