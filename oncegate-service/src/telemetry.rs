//! Tracing subscriber setup.
//!
//! Logs go to stderr so binaries that stream data on stdout (such as
//! `oncegate-dedup`) stay clean.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::{DEFAULT_LOG_FILTER, ENV_LOG, ENV_LOG_FORMAT};
use crate::error::{ServiceError, ServiceResult};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// EnvFilter directive, e.g. `info` or `oncegate_cache=debug,info`
    pub filter: String,
    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var(ENV_LOG).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            json: std::env::var(ENV_LOG_FORMAT)
                .map(|s| s.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

/// Install the global tracing subscriber. Call once at startup; a second
/// call fails because a subscriber is already set.
pub fn init_tracing(config: &TelemetryConfig) -> ServiceResult<()> {
    let env_filter = EnvFilter::try_new(&config.filter).map_err(|e| ServiceError::Telemetry {
        reason: format!("invalid filter {:?}: {}", config.filter, e),
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| ServiceError::Telemetry {
        reason: e.to_string(),
    })?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let config = TelemetryConfig {
            filter: "oncegate=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(
            init_tracing(&config),
            Err(ServiceError::Telemetry { .. })
        ));
    }

    #[test]
    fn test_explicit_config() {
        let config = TelemetryConfig {
            filter: "debug".to_string(),
            json: true,
        };
        assert_eq!(config.filter, "debug");
        assert!(config.json);
    }
}
