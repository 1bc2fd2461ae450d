//! Background Sweep Task
//!
//! Observations purge expired entries lazily, a few at a time. A cache that
//! stops receiving traffic would otherwise hold its expired entries until
//! capacity pressure pushed them out, so this task periodically sweeps
//! every domain in a [`CacheRegistry`].
//!
//! Each domain is swept in batches of `sweep_batch`, with the cache lock
//! released between batches; observers in other tasks are only ever held up
//! for one batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::metrics::GuardMetrics;
use crate::registry::CacheRegistry;
use crate::settings::GuardSettings;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since the task started.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    /// Sweep cycles completed
    pub cycles: AtomicU64,

    /// Expired entries purged across all domains
    pub entries_purged: AtomicU64,

    /// Domains that failed to sweep
    pub errors: AtomicU64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            entries_purged: self.entries_purged.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSnapshot {
    pub cycles: u64,
    pub entries_purged: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Sweep every domain in `registry` every `settings.sweep_interval` until
/// the shutdown signal turns true.
///
/// When `metrics` is set, each cycle's duration is observed and every
/// domain's eviction counters and live-entry gauge are synced.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(sweep_task(registry, settings, Some(metrics), shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let sweep_metrics = handle.await?;
/// ```
pub async fn sweep_task<C>(
    registry: Arc<CacheRegistry<C>>,
    settings: GuardSettings,
    metrics: Option<Arc<GuardMetrics>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweepMetrics>
where
    C: Clone + Send + Sync + 'static,
{
    let sweep_metrics = Arc::new(SweepMetrics::new());

    let mut sweep_interval = interval(settings.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_ms = settings.sweep_interval.as_millis() as u64,
        sweep_batch = settings.sweep_batch,
        "Sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shut down.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                run_cycle(&registry, metrics.as_deref(), &sweep_metrics);
            }
        }
    }

    let snapshot = sweep_metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        entries_purged = snapshot.entries_purged,
        errors = snapshot.errors,
        "Sweep task completed"
    );

    sweep_metrics
}

/// One sweep over every domain.
fn run_cycle<C: Clone + Send + Sync>(
    registry: &CacheRegistry<C>,
    metrics: Option<&GuardMetrics>,
    sweep_metrics: &SweepMetrics,
) {
    let started = Instant::now();
    let report = registry.sweep_all();
    let elapsed = started.elapsed();

    sweep_metrics.cycles.fetch_add(1, Ordering::Relaxed);
    sweep_metrics
        .entries_purged
        .fetch_add(report.purged as u64, Ordering::Relaxed);
    sweep_metrics
        .errors
        .fetch_add(report.errors as u64, Ordering::Relaxed);

    if let Some(metrics) = metrics {
        metrics.observe_sweep_duration(elapsed.as_secs_f64());
        for (domain, cache) in registry.entries() {
            metrics.sync_cache_stats(&domain, &cache.stats());
        }
    }

    if report.purged > 0 || report.errors > 0 {
        tracing::debug!(
            domains = report.domains,
            purged = report.purged,
            errors = report.errors,
            elapsed_us = elapsed.as_micros() as u64,
            "Sweep cycle completed"
        );
    } else {
        tracing::trace!(domains = report.domains, "Sweep cycle found nothing to purge");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_metrics_snapshot() {
        let metrics = SweepMetrics::new();
        metrics.cycles.fetch_add(2, Ordering::Relaxed);
        metrics.entries_purged.fetch_add(40, Ordering::Relaxed);
        assert_eq!(
            metrics.snapshot(),
            SweepSnapshot {
                cycles: 2,
                entries_purged: 40,
                errors: 0
            }
        );
    }
}
