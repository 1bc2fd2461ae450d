//! Configuration types

use crate::{ConfigError, GuardResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted capacity. Anything above this is almost certainly a
/// unit mistake (bytes for entries, milliseconds for counts).
pub const MAX_CAPACITY: usize = u32::MAX as usize;

/// Hard upper bound for any TTL, default or per-call (ten years).
pub const TTL_CEILING: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Default maximum number of live entries.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default time-to-live for entries that do not specify one (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum token length in bytes.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 1024;

/// Default number of expired entries purged inline per `observe`.
pub const DEFAULT_PURGE_BATCH: usize = 64;

// ============================================================================
// REUSE MODE
// ============================================================================

/// Whether repeated tokens are reported as duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReuseMode {
    /// Every repeat within the window is a duplicate.
    #[default]
    Reject,
    /// The duplicate check is bypassed: every valid token is `Accepted`.
    /// Absent tokens are still recorded so their context can be recalled.
    Allow,
}

impl ReuseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReuseMode::Reject => "reject",
            ReuseMode::Allow => "allow",
        }
    }
}

impl fmt::Display for ReuseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReuseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(ReuseMode::Reject),
            "allow" => Ok(ReuseMode::Allow),
            other => Err(ConfigError::InvalidValue {
                field: "reuse_mode".to_string(),
                value: other.to_string(),
                reason: "expected 'reject' or 'allow'".to_string(),
            }),
        }
    }
}

// ============================================================================
// CACHE CONFIG
// ============================================================================

/// Configuration for a uniqueness cache.
///
/// Deserializes with every field optional; absent fields take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries. `0` means unbounded.
    pub capacity: usize,
    /// TTL applied when a caller does not specify one.
    pub default_ttl: Duration,
    /// Upper bound for per-call TTL overrides.
    pub max_ttl: Option<Duration>,
    /// Longest accepted token, in bytes.
    pub max_token_len: usize,
    /// Expired entries physically purged inline by each `observe`.
    pub purge_batch: usize,
    pub reuse_mode: ReuseMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: DEFAULT_TTL,
            max_ttl: None,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            purge_batch: DEFAULT_PURGE_BATCH,
            reuse_mode: ReuseMode::Reject,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity (0 = unbounded).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Cap per-call TTL overrides.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = Some(ttl);
        self
    }

    pub fn with_max_token_len(mut self, len: usize) -> Self {
        self.max_token_len = len;
        self
    }

    pub fn with_purge_batch(mut self, batch: usize) -> Self {
        self.purge_batch = batch;
        self
    }

    pub fn with_reuse_mode(mut self, mode: ReuseMode) -> Self {
        self.reuse_mode = mode;
        self
    }

    /// Whether capacity eviction is disabled.
    pub fn is_unbounded(&self) -> bool {
        self.capacity == 0
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - capacity <= MAX_CAPACITY
    /// - default_ttl > 0
    /// - default_ttl and max_ttl <= TTL_CEILING
    /// - max_ttl >= default_ttl when set
    /// - max_token_len > 0
    /// - purge_batch > 0
    pub fn validate(&self) -> GuardResult<()> {
        if self.capacity > MAX_CAPACITY {
            return Err(ConfigError::CapacityMisconfigured {
                value: self.capacity.to_string(),
                reason: format!("must be at most {}", MAX_CAPACITY),
            }
            .into());
        }

        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".to_string(),
                value: format!("{:?}", self.default_ttl),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        for (field, ttl) in [("default_ttl", Some(self.default_ttl)), ("max_ttl", self.max_ttl)] {
            if let Some(ttl) = ttl {
                if ttl > TTL_CEILING {
                    return Err(ConfigError::InvalidValue {
                        field: field.to_string(),
                        value: format!("{:?}", ttl),
                        reason: format!("must be at most {:?}", TTL_CEILING),
                    }
                    .into());
                }
            }
        }

        if let Some(max_ttl) = self.max_ttl {
            if max_ttl < self.default_ttl {
                return Err(ConfigError::IncompatibleOptions {
                    option_a: format!("max_ttl={:?}", max_ttl),
                    option_b: format!("default_ttl={:?}", self.default_ttl),
                }
                .into());
            }
        }

        if self.max_token_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_token_len".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        if self.purge_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "purge_batch".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
