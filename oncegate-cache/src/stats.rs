//! Cache usage counters.
//!
//! Counters are lock-free atomics updated after the store lock is released,
//! so reading statistics never contends with the access gate.

use oncegate_core::Outcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a cache.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    duplicate_other_owner: AtomicU64,
    invalid: AtomicU64,
    expired_evictions: AtomicU64,
    capacity_evictions: AtomicU64,
    removals: AtomicU64,
}

impl CacheCounters {
    pub fn record_outcome(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Accepted => &self.accepted,
            Outcome::Duplicate => &self.duplicates,
            Outcome::DuplicateOtherOwner => &self.duplicate_other_owner,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        if count > 0 {
            self.expired_evictions
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_capacity(&self, count: usize) {
        if count > 0 {
            self.capacity_evictions
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_removed(&self, count: usize) {
        if count > 0 {
            self.removals.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, entry_count: usize) -> CacheStats {
        CacheStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            duplicate_other_owner: self.duplicate_other_owner.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
            capacity_evictions: self.capacity_evictions.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            entry_count: entry_count as u64,
        }
    }
}

/// Statistics about cache usage at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Observations that admitted a token.
    pub accepted: u64,
    /// Observations rejected as a same-owner (or ownerless) replay.
    pub duplicates: u64,
    /// Observations rejected because another owner holds the token.
    pub duplicate_other_owner: u64,
    /// Calls rejected for an invalid token or TTL.
    pub invalid: u64,
    /// Entries removed because their TTL elapsed.
    pub expired_evictions: u64,
    /// Entries removed to stay within capacity.
    pub capacity_evictions: u64,
    /// Entries removed by `remove` or `clear`.
    pub removals: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
}

impl CacheStats {
    /// Total observations that reached the duplicate check.
    pub fn observations(&self) -> u64 {
        self.accepted + self.duplicates + self.duplicate_other_owner
    }

    /// Fraction of observations rejected as duplicates (0.0 to 1.0).
    pub fn duplicate_rate(&self) -> f64 {
        let total = self.observations();
        if total == 0 {
            0.0
        } else {
            (self.duplicates + self.duplicate_other_owner) as f64 / total as f64
        }
    }
}
