//! Per-domain cache instances.
//!
//! Each protected surface (an endpoint's nonces, a queue's job ids) gets its
//! own [`UniquenessCache`] so a flood in one domain cannot evict tokens of
//! another. The registry is an explicit value handed to whoever needs it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oncegate_cache::UniquenessCache;
use oncegate_core::{Clock, ConfigError, GuardResult, SystemClock};

use crate::settings::GuardSettings;

/// Totals from one [`CacheRegistry::sweep_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub domains: usize,
    pub purged: usize,
    pub errors: usize,
}

/// Caches keyed by domain name, all built from one [`GuardSettings`].
pub struct CacheRegistry<C = serde_json::Value> {
    settings: GuardSettings,
    clock: Arc<dyn Clock>,
    caches: DashMap<String, Arc<UniquenessCache<C>>>,
}

impl<C: Clone + Send + Sync> CacheRegistry<C> {
    pub fn new(settings: GuardSettings) -> GuardResult<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Every cache created by this registry reads time from `clock`.
    pub fn with_clock(settings: GuardSettings, clock: Arc<dyn Clock>) -> GuardResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            clock,
            caches: DashMap::new(),
        })
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Cache for `domain`, created on first use.
    pub fn get_or_create(&self, domain: &str) -> GuardResult<Arc<UniquenessCache<C>>> {
        if domain.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "domain".to_string(),
                value: domain.to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        match self.caches.entry(domain.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let cache = Arc::new(UniquenessCache::with_clock(
                    self.settings.cache.clone(),
                    Arc::clone(&self.clock),
                )?);
                entry.insert(Arc::clone(&cache));
                tracing::info!(domain, capacity = cache.capacity(), "Created uniqueness cache");
                Ok(cache)
            }
        }
    }

    pub fn get(&self, domain: &str) -> Option<Arc<UniquenessCache<C>>> {
        self.caches.get(domain).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered domain names, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        domains.sort();
        domains
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Purge expired entries in every domain, `sweep_batch` entries per
    /// lock acquisition. A failing domain is logged and counted; the others
    /// are still swept.
    pub fn sweep_all(&self) -> SweepReport {
        let batch = self.settings.sweep_batch;
        let mut report = SweepReport::default();

        // Snapshot first so no DashMap shard lock is held while sweeping.
        let caches: Vec<(String, Arc<UniquenessCache<C>>)> = self
            .caches
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        for (domain, cache) in caches {
            report.domains += 1;
            match sweep_cache(&cache, batch) {
                Ok(purged) => {
                    if purged > 0 {
                        tracing::debug!(domain = %domain, purged, "Swept domain");
                    }
                    report.purged += purged;
                }
                Err(err) => {
                    tracing::error!(domain = %domain, error = %err, "Failed to sweep domain");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Each domain with its cache, for stats export.
    pub fn entries(&self) -> Vec<(String, Arc<UniquenessCache<C>>)> {
        let mut entries: Vec<_> = self
            .caches
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

fn sweep_cache<C: Clone + Send>(cache: &UniquenessCache<C>, batch: usize) -> GuardResult<usize> {
    let mut total = 0;
    loop {
        let purged = cache.sweep_batch(batch)?;
        total += purged;
        if purged < batch {
            return Ok(total);
        }
    }
}

impl<C> std::fmt::Debug for CacheRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("settings", &self.settings)
            .field("domains", &self.caches.len())
            .finish_non_exhaustive()
    }
}
