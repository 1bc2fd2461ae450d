//! Constants for the ONCEGATE service layer
//!
//! Default values and environment variable names live here so settings,
//! telemetry and the binaries agree on them.

// ============================================================================
// SWEEPER
// ============================================================================

/// Default interval between background sweeps (30 seconds)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Default number of expired entries purged per lock acquisition during a sweep
pub const DEFAULT_SWEEP_BATCH: usize = 1024;

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

pub const ENV_CAPACITY: &str = "ONCEGATE_CAPACITY";
pub const ENV_DEFAULT_TTL_SECS: &str = "ONCEGATE_DEFAULT_TTL_SECS";
pub const ENV_MAX_TTL_SECS: &str = "ONCEGATE_MAX_TTL_SECS";
pub const ENV_MAX_TOKEN_LEN: &str = "ONCEGATE_MAX_TOKEN_LEN";
pub const ENV_PURGE_BATCH: &str = "ONCEGATE_PURGE_BATCH";
pub const ENV_REUSE_MODE: &str = "ONCEGATE_REUSE_MODE";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "ONCEGATE_SWEEP_INTERVAL_SECS";
pub const ENV_SWEEP_BATCH: &str = "ONCEGATE_SWEEP_BATCH";

/// Log filter directive (EnvFilter syntax)
pub const ENV_LOG: &str = "ONCEGATE_LOG";

/// Set to `json` for structured log output
pub const ENV_LOG_FORMAT: &str = "ONCEGATE_LOG_FORMAT";

/// Filter used when `ONCEGATE_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// METRICS
// ============================================================================

/// Sweep duration buckets (seconds)
/// Covers: 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
pub const SWEEP_LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0,
];
