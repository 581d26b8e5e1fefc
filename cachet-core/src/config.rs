//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How misses are handed to the retrieval callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Each miss is offered to the retriever as a singleton set while keys
    /// are walked; the bulk pass only sees keys that were never offered.
    #[default]
    PerKey,
    /// No per-key fallback. Every miss is collected and offered in a single
    /// bulk call after all keys are walked.
    Batched,
}

impl FillMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerKey => "per_key",
            Self::Batched => "batched",
        }
    }
}

impl FromStr for FillMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_key" | "per-key" | "perkey" => Ok(Self::PerKey),
            "batched" | "bulk" => Ok(Self::Batched),
            other => Err(ConfigError::InvalidValue {
                field: "fill_mode".to_string(),
                value: other.to_string(),
                reason: "expected per_key or batched".to_string(),
            }),
        }
    }
}

/// Defaults applied to bulk operations built from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCacheConfig {
    /// Region used when the caller does not name one.
    pub default_region: Region,
    /// Expiration applied to values written during a bulk fill.
    pub default_expiration: Expiration,
    /// How misses reach the retrieval callback.
    pub fill_mode: FillMode,
    /// Upper bound on a whole bulk operation. `None` means unbounded.
    pub operation_timeout: Option<Duration>,
}

impl Default for BulkCacheConfig {
    fn default() -> Self {
        Self {
            default_region: Region::default(),
            default_expiration: Expiration::After(Duration::from_secs(3600)), // 1 hour
            fill_mode: FillMode::default(),
            operation_timeout: None,
        }
    }
}

impl BulkCacheConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default region.
    pub fn with_region(mut self, region: impl Into<Region>) -> Self {
        self.default_region = region.into();
        self
    }

    /// Set the default expiration.
    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.default_expiration = expiration;
        self
    }

    /// Set the fill mode.
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Set the operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Load configuration from `CACHET_*` environment variables.
    ///
    /// Unset variables keep their defaults:
    /// - `CACHET_DEFAULT_REGION`
    /// - `CACHET_DEFAULT_TTL_SECS` (0 = never expires)
    /// - `CACHET_FILL_MODE` (`per_key` or `batched`)
    /// - `CACHET_OPERATION_TIMEOUT_MS`
    pub fn from_env() -> CachetResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> CachetResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(region) = lookup("CACHET_DEFAULT_REGION") {
            config.default_region = Region::new(region.trim());
        }

        if let Some(raw) = lookup("CACHET_DEFAULT_TTL_SECS") {
            let secs = parse_u64("CACHET_DEFAULT_TTL_SECS", &raw)?;
            config.default_expiration = Expiration::from_secs(secs);
        }

        if let Some(raw) = lookup("CACHET_FILL_MODE") {
            config.fill_mode = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "CACHET_FILL_MODE".to_string(),
                value: raw.clone(),
                reason: "expected per_key or batched".to_string(),
            })?;
        }

        if let Some(raw) = lookup("CACHET_OPERATION_TIMEOUT_MS") {
            let ms = parse_u64("CACHET_OPERATION_TIMEOUT_MS", &raw)?;
            config.operation_timeout = Some(Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CachetResult<()> {
        if self.default_region.as_str().is_empty() {
            return Err(CachetError::Config(ConfigError::MissingRequired {
                field: "default_region".to_string(),
            }));
        }

        if self.operation_timeout == Some(Duration::ZERO) {
            return Err(CachetError::Config(ConfigError::InvalidValue {
                field: "operation_timeout".to_string(),
                value: "0".to_string(),
                reason: "operation_timeout must be greater than 0".to_string(),
            }));
        }

        if let Expiration::After(ttl) = self.default_expiration {
            if ttl.is_zero() {
                return Err(CachetError::Config(ConfigError::InvalidValue {
                    field: "default_expiration".to_string(),
                    value: "0s".to_string(),
                    reason: "use Expiration::Never instead of a zero ttl".to_string(),
                }));
            }
        }

        Ok(())
    }
}

fn parse_u64(field: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "expected a non-negative integer".to_string(),
    })
}
