//! Age-based and capacity-based eviction.
//!
//! Both policies operate on a locked [`Store`] and do bounded work per call:
//! age eviction pops at most `limit` entries from the front of the expiry
//! index, and capacity eviction pops from the front of the insertion index
//! only as many entries as needed to make room for one more.

use crate::store::Store;
use std::fmt;
use std::time::Instant;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// `now - inserted_at > ttl`
    Expired,
    /// Oldest entry removed to admit a new one.
    Capacity,
    /// Explicit `remove` or `clear`.
    Removed,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Expired => "expired",
            EvictionReason::Capacity => "capacity",
            EvictionReason::Removed => "removed",
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<C> Store<C> {
    /// Physically remove up to `limit` expired entries, soonest-expiring
    /// first. Returns how many were removed.
    pub(crate) fn purge_expired(&mut self, now: Instant, limit: usize) -> usize {
        let mut purged = 0;
        while purged < limit && self.pop_expired(now).is_some() {
            purged += 1;
        }
        purged
    }

    /// Evict oldest-first until one more entry fits under `capacity`.
    /// A `capacity` of zero means unbounded and evicts nothing.
    ///
    /// Runs before the new entry is inserted, so the entry being admitted
    /// can never be the one evicted.
    pub(crate) fn make_room(&mut self, capacity: usize) -> usize {
        if capacity == 0 {
            return 0;
        }
        let mut evicted = 0;
        while self.len() >= capacity {
            if self.pop_oldest().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }
}
