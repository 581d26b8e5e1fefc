//! Error types for cachet operations

use std::time::Duration;
use thiserror::Error;

/// Cache layer errors.
///
/// These cover failures raised by collaborators (the cache port and the
/// caller-supplied callbacks). An unresolvable miss is not an error and has
/// no variant here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache port failure for {item_key} in region {region}: {reason}")]
    PortFailure {
        region: String,
        item_key: String,
        reason: String,
    },

    #[error("Retrieval failed: {reason}")]
    RetrievalFailed { reason: String },

    #[error("Validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Bulk operation timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all cachet errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CachetError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CachetError {
    /// Shorthand for a retrieval callback failure.
    pub fn retrieval(reason: impl Into<String>) -> Self {
        CacheError::RetrievalFailed {
            reason: reason.into(),
        }
        .into()
    }

    /// Shorthand for a validation callback failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        CacheError::ValidationFailed {
            reason: reason.into(),
        }
        .into()
    }
}

/// Result type alias for cachet operations.
pub type CachetResult<T> = Result<T, CachetError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display_port_failure() {
        let err = CacheError::PortFailure {
            region: "R".to_string(),
            item_key: "user:1".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("user:1"));
        assert!(msg.contains("region R"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_cache_error_display_timeout() {
        let err = CacheError::Timeout {
            elapsed: Duration::from_millis(250),
        };
        assert!(format!("{}", err).contains("250ms"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "CACHET_FILL_MODE".to_string(),
            value: "sideways".to_string(),
            reason: "expected per_key or batched".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("CACHET_FILL_MODE"));
        assert!(msg.contains("sideways"));
        assert!(msg.contains("expected per_key or batched"));
    }

    #[test]
    fn test_cachet_error_from_cache_error() {
        let err: CachetError = CacheError::RetrievalFailed {
            reason: "backend down".to_string(),
        }
        .into();
        assert!(matches!(err, CachetError::Cache(_)));
        assert!(format!("{}", err).contains("backend down"));
    }

    #[test]
    fn test_shorthand_constructors() {
        assert_eq!(
            CachetError::retrieval("x"),
            CachetError::Cache(CacheError::RetrievalFailed {
                reason: "x".to_string()
            })
        );
        assert_eq!(
            CachetError::validation("y"),
            CachetError::Cache(CacheError::ValidationFailed {
                reason: "y".to_string()
            })
        );
    }
}
