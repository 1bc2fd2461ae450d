//! Prometheus Metrics
//!
//! All series live on a [`Registry`] owned by [`GuardMetrics`], so several
//! guards (or several tests) can each keep their own set without colliding
//! in a process-wide registry.
//!
//! Observation outcomes are counted as they happen via
//! [`GuardMetrics::record_observation`]. Eviction counters and the live-entry
//! gauge are brought up to date from a cache's [`CacheStats`] via
//! [`GuardMetrics::sync_cache_stats`], which the background sweeper calls
//! after every cycle.

use std::fmt;

use oncegate_cache::{CacheStats, EvictionReason};
use oncegate_core::{GuardResult, Outcome};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::constants::SWEEP_LATENCY_BUCKETS;
use crate::error::{ServiceError, ServiceResult};

/// Container for all ONCEGATE metrics.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,

    /// Observation counter - labels: domain, outcome
    pub observations_total: IntCounterVec,

    /// Rejected tokens and TTLs - labels: domain
    pub invalid_tokens_total: IntCounterVec,

    /// Entries evicted - labels: domain, reason
    pub evictions_total: IntCounterVec,

    /// Entries currently stored - labels: domain
    pub live_entries: IntGaugeVec,

    /// Duration of full sweep cycles across all domains
    pub sweep_duration_seconds: Histogram,
}

impl GuardMetrics {
    /// Create all metrics and register them on a fresh registry.
    pub fn new() -> ServiceResult<Self> {
        let registry = Registry::new();

        let observations_total = IntCounterVec::new(
            Opts::new(
                "oncegate_observations_total",
                "Tokens presented to the uniqueness gate",
            ),
            &["domain", "outcome"],
        )
        .map_err(|e| registration_error("oncegate_observations_total", e))?;

        let invalid_tokens_total = IntCounterVec::new(
            Opts::new(
                "oncegate_invalid_tokens_total",
                "Observations rejected for an invalid token or ttl",
            ),
            &["domain"],
        )
        .map_err(|e| registration_error("oncegate_invalid_tokens_total", e))?;

        let evictions_total = IntCounterVec::new(
            Opts::new("oncegate_evictions_total", "Entries removed from the cache"),
            &["domain", "reason"],
        )
        .map_err(|e| registration_error("oncegate_evictions_total", e))?;

        let live_entries = IntGaugeVec::new(
            Opts::new("oncegate_live_entries", "Entries currently stored"),
            &["domain"],
        )
        .map_err(|e| registration_error("oncegate_live_entries", e))?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "oncegate_sweep_duration_seconds",
                "Duration of background sweep cycles in seconds",
            )
            .buckets(SWEEP_LATENCY_BUCKETS.to_vec()),
        )
        .map_err(|e| registration_error("oncegate_sweep_duration_seconds", e))?;

        registry
            .register(Box::new(observations_total.clone()))
            .map_err(|e| registration_error("oncegate_observations_total", e))?;
        registry
            .register(Box::new(invalid_tokens_total.clone()))
            .map_err(|e| registration_error("oncegate_invalid_tokens_total", e))?;
        registry
            .register(Box::new(evictions_total.clone()))
            .map_err(|e| registration_error("oncegate_evictions_total", e))?;
        registry
            .register(Box::new(live_entries.clone()))
            .map_err(|e| registration_error("oncegate_live_entries", e))?;
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .map_err(|e| registration_error("oncegate_sweep_duration_seconds", e))?;

        Ok(Self {
            registry,
            observations_total,
            invalid_tokens_total,
            evictions_total,
            live_entries,
            sweep_duration_seconds,
        })
    }

    /// The registry these metrics are registered on.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count one `observe` result for `domain`.
    ///
    /// Caller errors (bad token, bad ttl) count as invalid; internal errors
    /// are not counted here.
    pub fn record_observation(&self, domain: &str, result: &GuardResult<Outcome>) {
        match result {
            Ok(outcome) => self
                .observations_total
                .with_label_values(&[domain, outcome.as_str()])
                .inc(),
            Err(err) if err.is_caller_error() => {
                self.invalid_tokens_total.with_label_values(&[domain]).inc()
            }
            Err(_) => {}
        }
    }

    /// Bring eviction counters and the live-entry gauge in line with
    /// `stats`. Counters only ever move forward.
    pub fn sync_cache_stats(&self, domain: &str, stats: &CacheStats) {
        let evictions = [
            (EvictionReason::Expired, stats.expired_evictions),
            (EvictionReason::Capacity, stats.capacity_evictions),
            (EvictionReason::Removed, stats.removals),
        ];
        for (reason, total) in evictions {
            let counter = self
                .evictions_total
                .with_label_values(&[domain, reason.as_str()]);
            let current = counter.get();
            if total > current {
                counter.inc_by(total - current);
            }
        }

        self.live_entries
            .with_label_values(&[domain])
            .set(i64::try_from(stats.entry_count).unwrap_or(i64::MAX));
    }

    pub fn observe_sweep_duration(&self, seconds: f64) {
        self.sweep_duration_seconds.observe(seconds);
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn render(&self) -> ServiceResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| ServiceError::MetricsEncode {
                reason: e.to_string(),
            })?;
        String::from_utf8(buffer).map_err(|e| ServiceError::MetricsEncode {
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for GuardMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardMetrics").finish_non_exhaustive()
    }
}

fn registration_error(metric: &'static str, err: prometheus::Error) -> ServiceError {
    ServiceError::MetricsRegistration {
        metric,
        reason: err.to_string(),
    }
}
