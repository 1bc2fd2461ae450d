//! Guard settings: a cache configuration plus sweeper parameters.
//!
//! Settings come from the environment ([`GuardSettings::from_env`]), from a
//! TOML file ([`GuardSettings::from_path`]) or from one of the presets.
//! Values that are present but malformed are errors; only absent values
//! fall back to defaults.
//!
//! ```toml
//! capacity = 50000
//! default_ttl_secs = 120
//! max_ttl_secs = 3600
//! reuse_mode = "reject"
//! sweep_interval_secs = 15
//! ```

use crate::constants::{
    DEFAULT_SWEEP_BATCH, DEFAULT_SWEEP_INTERVAL_SECS, ENV_CAPACITY, ENV_DEFAULT_TTL_SECS,
    ENV_MAX_TOKEN_LEN, ENV_MAX_TTL_SECS, ENV_PURGE_BATCH, ENV_REUSE_MODE, ENV_SWEEP_BATCH,
    ENV_SWEEP_INTERVAL_SECS,
};
use oncegate_core::{CacheConfig, ConfigError, GuardResult, ReuseMode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSettings {
    /// Configuration applied to every cache built from these settings.
    pub cache: CacheConfig,

    /// How often the background sweeper runs (default: 30 seconds)
    pub sweep_interval: Duration,

    /// Expired entries purged per lock acquisition during a sweep
    /// (default: 1024)
    pub sweep_batch: usize,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_batch: DEFAULT_SWEEP_BATCH,
        }
    }
}

impl GuardSettings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    /// - `ONCEGATE_CAPACITY`: Maximum live entries, 0 for unbounded (default: 10000)
    /// - `ONCEGATE_DEFAULT_TTL_SECS`: Default entry lifetime (default: 300)
    /// - `ONCEGATE_MAX_TTL_SECS`: Upper bound for per-call TTLs (default: unset)
    /// - `ONCEGATE_MAX_TOKEN_LEN`: Longest accepted token in bytes (default: 1024)
    /// - `ONCEGATE_PURGE_BATCH`: Expired entries purged per observe (default: 64)
    /// - `ONCEGATE_REUSE_MODE`: `reject` or `allow` (default: reject)
    /// - `ONCEGATE_SWEEP_INTERVAL_SECS`: Background sweep interval (default: 30)
    /// - `ONCEGATE_SWEEP_BATCH`: Entries purged per sweep batch (default: 1024)
    pub fn from_env() -> GuardResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup, using the same keys and
    /// rules as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> GuardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut cache = defaults.cache.clone();

        if let Some(raw) = lookup(ENV_CAPACITY) {
            cache.capacity = parse_capacity(&raw)?;
        }
        if let Some(secs) = parse_env_u64(&lookup, ENV_DEFAULT_TTL_SECS)? {
            cache.default_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env_u64(&lookup, ENV_MAX_TTL_SECS)? {
            cache.max_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(len) = parse_env_u64(&lookup, ENV_MAX_TOKEN_LEN)? {
            cache.max_token_len = to_usize(ENV_MAX_TOKEN_LEN, len)?;
        }
        if let Some(batch) = parse_env_u64(&lookup, ENV_PURGE_BATCH)? {
            cache.purge_batch = to_usize(ENV_PURGE_BATCH, batch)?;
        }
        if let Some(raw) = lookup(ENV_REUSE_MODE) {
            cache.reuse_mode = raw.parse::<ReuseMode>()?;
        }

        let sweep_interval = match parse_env_u64(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.sweep_interval,
        };
        let sweep_batch = match parse_env_u64(&lookup, ENV_SWEEP_BATCH)? {
            Some(batch) => to_usize(ENV_SWEEP_BATCH, batch)?,
            None => defaults.sweep_batch,
        };

        let settings = Self {
            cache,
            sweep_interval,
            sweep_batch,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML. Unknown keys are rejected.
    pub fn from_toml_str(contents: &str) -> GuardResult<Self> {
        let file: SettingsFile = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        let settings = file.into_settings()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a TOML settings file.
    pub fn from_path(path: &Path) -> GuardResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Small caches, short windows and frequent sweeps for local work.
    pub fn development() -> Self {
        Self {
            cache: CacheConfig::new()
                .with_capacity(1_000)
                .with_default_ttl(Duration::from_secs(30))
                .with_max_ttl(Duration::from_secs(300))
                .with_purge_batch(16),
            sweep_interval: Duration::from_secs(5),
            sweep_batch: 128,
        }
    }

    /// Large caches with a bounded per-call TTL.
    pub fn production() -> Self {
        Self {
            cache: CacheConfig::new()
                .with_capacity(100_000)
                .with_default_ttl(Duration::from_secs(300))
                .with_max_ttl(Duration::from_secs(3600)),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_batch: DEFAULT_SWEEP_BATCH,
        }
    }

    /// Validate the cache configuration and sweeper parameters.
    pub fn validate(&self) -> GuardResult<()> {
        self.cache.validate()?;

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "sweep_interval".to_string(),
                value: format!("{:?}", self.sweep_interval),
                reason: "must be > 0".to_string(),
            }
            .into());
        }
        if self.sweep_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep_batch".to_string(),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// TOML FILE
// ============================================================================

/// On-disk layout. Every key is optional; absent keys take the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    capacity: Option<i64>,
    default_ttl_secs: Option<u64>,
    max_ttl_secs: Option<u64>,
    max_token_len: Option<u64>,
    purge_batch: Option<u64>,
    reuse_mode: Option<ReuseMode>,
    sweep_interval_secs: Option<u64>,
    sweep_batch: Option<u64>,
}

impl SettingsFile {
    fn into_settings(self) -> GuardResult<GuardSettings> {
        let mut settings = GuardSettings::default();
        let cache = &mut settings.cache;

        if let Some(capacity) = self.capacity {
            cache.capacity = check_capacity(i128::from(capacity))?;
        }
        if let Some(secs) = self.default_ttl_secs {
            cache.default_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_ttl_secs {
            cache.max_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(len) = self.max_token_len {
            cache.max_token_len = to_usize("max_token_len", len)?;
        }
        if let Some(batch) = self.purge_batch {
            cache.purge_batch = to_usize("purge_batch", batch)?;
        }
        if let Some(mode) = self.reuse_mode {
            cache.reuse_mode = mode;
        }
        if let Some(secs) = self.sweep_interval_secs {
            settings.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(batch) = self.sweep_batch {
            settings.sweep_batch = to_usize("sweep_batch", batch)?;
        }
        Ok(settings)
    }
}

// ============================================================================
// PARSING HELPERS
// ============================================================================

/// Capacity gets its own error: a negative or absurd value is the classic
/// misconfiguration for a bounded cache.
fn parse_capacity(raw: &str) -> GuardResult<usize> {
    let trimmed = raw.trim();
    let value: i128 = trimmed.parse().map_err(|_| ConfigError::CapacityMisconfigured {
        value: trimmed.to_string(),
        reason: "not an integer".to_string(),
    })?;
    check_capacity(value)
}

/// Range check shared by the env and TOML paths.
fn check_capacity(value: i128) -> GuardResult<usize> {
    if value < 0 {
        return Err(ConfigError::CapacityMisconfigured {
            value: value.to_string(),
            reason: "must not be negative".to_string(),
        }
        .into());
    }
    usize::try_from(value).map_err(|_| {
        ConfigError::CapacityMisconfigured {
            value: value.to_string(),
            reason: "too large for this platform".to_string(),
        }
        .into()
    })
}

fn parse_env_u64<F>(lookup: &F, key: &str) -> GuardResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(ConfigError::InvalidValue {
            field: key.to_string(),
            value: trimmed.to_string(),
            reason: "must not be negative".to_string(),
        }
        .into());
    }
    trimmed.parse::<u64>().map(Some).map_err(|_| {
        ConfigError::InvalidValue {
            field: key.to_string(),
            value: trimmed.to_string(),
            reason: "not an unsigned integer".to_string(),
        }
        .into()
    })
}

fn to_usize(field: &str, value: u64) -> GuardResult<usize> {
    usize::try_from(value).map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "too large for this platform".to_string(),
        }
        .into()
    })
}

// ============================================================================
// TESTS
// ============================================================================
