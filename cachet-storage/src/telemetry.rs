//! Tracing subscriber initialization.
//!
//! Bulk operations log through `tracing`: one `bulk_get` span per call with
//! per-phase `debug` events and per-key `trace` events. This module wires a
//! subscriber for binaries and tests that do not bring their own.

use cachet_core::{CachetResult, ConfigError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("CACHET_SERVICE_NAME")
                .unwrap_or_else(|_| "cachet".to_string()),
            default_filter: std::env::var("CACHET_LOG")
                .unwrap_or_else(|_| "cachet_storage=info,warn".to_string()),
            json: std::env::var("CACHET_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }
}

impl TelemetryConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> CachetResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| ConfigError::InvalidValue {
            field: "default_filter".to_string(),
            value: config.default_filter.clone(),
            reason: e.to_string(),
        })?;

    let json_layer = config.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigError::InvalidValue {
            field: "tracing_subscriber".to_string(),
            value: config.service_name.clone(),
            reason: format!("Failed to init subscriber: {}", e),
        })?;

    tracing::info!(
        service_name = config.service_name,
        json = config.json,
        "Telemetry initialized"
    );

    Ok(())
}
