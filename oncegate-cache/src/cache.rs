//! The uniqueness cache and its access gate.
//!
//! A single `Mutex` guards the store. Every check-and-insert happens inside
//! one critical section, so two concurrent `observe` calls for the same
//! token can never both see it absent. Work done under the lock is bounded:
//! O(log n) per insert/remove plus at most `purge_batch` expired entries.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use oncegate_core::{
    CacheConfig, Clock, EntrySnapshot, GuardError, GuardResult, ObserveRequest, Outcome, OwnerId,
    ReuseMode, SystemClock, Token, TokenError, TTL_CEILING,
};

use crate::stats::{CacheCounters, CacheStats};
use crate::store::{NewEntry, Store};

/// Bounded, time-windowed uniqueness cache.
///
/// `C` is the context type attached to tokens at acceptance and returned by
/// [`peek`](Self::peek). Construct one per process or one per protected
/// domain and share it behind an `Arc`; there is no global instance.
///
/// # Example
///
/// ```
/// use oncegate_cache::UniquenessCache;
/// use oncegate_core::{CacheConfig, Outcome};
/// use std::time::Duration;
///
/// let cache: UniquenessCache = UniquenessCache::new(
///     CacheConfig::new()
///         .with_capacity(1_000)
///         .with_default_ttl(Duration::from_secs(60)),
/// )
/// .unwrap();
///
/// assert_eq!(cache.observe("nonce-1").unwrap(), Outcome::Accepted);
/// assert_eq!(cache.observe("nonce-1").unwrap(), Outcome::Duplicate);
/// ```
pub struct UniquenessCache<C = serde_json::Value> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    store: Mutex<Store<C>>,
    counters: CacheCounters,
}

/// What happened inside one `observe` critical section.
struct GateDecision {
    outcome: Outcome,
    expired: usize,
    evicted: usize,
    stored_owner: Option<OwnerId>,
}

impl<C: Clone + Send> UniquenessCache<C> {
    /// Create a cache on the system monotonic clock.
    ///
    /// Fails with a configuration error if `config` does not validate; no
    /// cache is produced in that case.
    pub fn new(config: CacheConfig) -> GuardResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> GuardResult<Self> {
        config.validate()?;

        if config.is_unbounded() {
            tracing::warn!(
                default_ttl_secs = config.default_ttl.as_secs(),
                "Uniqueness cache created without a capacity bound; memory is limited only by ttl and sweeps"
            );
        }

        tracing::debug!(
            capacity = config.capacity,
            default_ttl_ms = config.default_ttl.as_millis() as u64,
            reuse_mode = %config.reuse_mode,
            "Uniqueness cache created"
        );

        Ok(Self {
            config,
            clock,
            store: Mutex::new(Store::new()),
            counters: CacheCounters::default(),
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Configured capacity (0 = unbounded).
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    // ========================================================================
    // ACCESS GATE
    // ========================================================================

    /// Present a token with no owner, context or TTL override.
    pub fn observe(&self, token: impl Into<Token>) -> GuardResult<Outcome> {
        self.observe_with(ObserveRequest::new(token))
    }

    /// Atomically check a token and record it if it is not live.
    ///
    /// Expired entries are purged (up to `purge_batch`) before the check,
    /// and an expired entry for this very token is always replaced rather
    /// than reported as a duplicate. On acceptance, the oldest entries are
    /// evicted first if the cache is full.
    ///
    /// Invalid tokens and TTLs are rejected before the lock is taken and
    /// leave the cache untouched.
    pub fn observe_with(&self, request: ObserveRequest<C>) -> GuardResult<Outcome> {
        let ObserveRequest {
            token,
            owner,
            ttl,
            context,
        } = request;

        let ttl = match self
            .validate_token(&token)
            .and_then(|_| self.resolve_ttl(ttl))
        {
            Ok(ttl) => ttl,
            Err(err) => {
                self.counters.record_invalid();
                tracing::debug!(error = %err, "Rejected observation");
                return Err(err);
            }
        };

        let decision = {
            let mut store = self.lock()?;
            let now = self.clock.now();

            let mut expired = store.purge_expired(now, self.config.purge_batch);

            match store.get_live(token.as_bytes(), now) {
                Some(slot) => {
                    let outcome = match self.config.reuse_mode {
                        ReuseMode::Allow => Outcome::Accepted,
                        ReuseMode::Reject => match (&slot.owner, &owner) {
                            (Some(stored), Some(presented)) if stored != presented => {
                                Outcome::DuplicateOtherOwner
                            }
                            _ => Outcome::Duplicate,
                        },
                    };
                    GateDecision {
                        outcome,
                        expired,
                        evicted: 0,
                        stored_owner: slot.owner.clone(),
                    }
                }
                None => {
                    if store.remove(token.as_bytes()).is_some() {
                        expired += 1;
                    }
                    let evicted = store.make_room(self.config.capacity);
                    store.insert(NewEntry {
                        token: token.clone(),
                        now,
                        ttl,
                        owner: owner.clone(),
                        context,
                    });
                    GateDecision {
                        outcome: Outcome::Accepted,
                        expired,
                        evicted,
                        stored_owner: None,
                    }
                }
            }
        };

        self.counters.record_outcome(decision.outcome);
        self.counters.record_expired(decision.expired);
        self.counters.record_capacity(decision.evicted);

        if decision.evicted > 0 {
            tracing::debug!(
                evicted = decision.evicted,
                capacity = self.config.capacity,
                "Evicted oldest entries to admit new token"
            );
        }

        match decision.outcome {
            Outcome::DuplicateOtherOwner => {
                tracing::warn!(
                    token = %token,
                    stored_owner = ?decision.stored_owner.as_ref().map(OwnerId::as_str),
                    presented_owner = ?owner.as_ref().map(OwnerId::as_str),
                    "Token presented by a different owner than the one it was issued to"
                );
            }
            outcome => {
                tracing::trace!(token = %token, outcome = %outcome, "Observed token");
            }
        }

        Ok(decision.outcome)
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Look at a live entry without touching its liveness or ordering.
    ///
    /// Expired entries read as absent even if they have not been purged.
    pub fn peek(&self, token: impl Into<Token>) -> GuardResult<Option<EntrySnapshot<C>>> {
        let token = token.into();
        self.validate_token(&token)?;

        let store = self.lock()?;
        let now = self.clock.now();
        Ok(store
            .get_live(token.as_bytes(), now)
            .map(|slot| slot.snapshot(&token, now)))
    }

    /// Whether `token` is currently live.
    pub fn contains(&self, token: impl Into<Token>) -> GuardResult<bool> {
        let token = token.into();
        self.validate_token(&token)?;

        let store = self.lock()?;
        let now = self.clock.now();
        Ok(store.get_live(token.as_bytes(), now).is_some())
    }

    // ========================================================================
    // EXPLICIT REMOVAL
    // ========================================================================

    /// Stop tracking a token. Returns true if a live entry was removed;
    /// removing an absent token is a no-op.
    pub fn remove(&self, token: impl Into<Token>) -> GuardResult<bool> {
        let token = token.into();
        self.validate_token(&token)?;

        let removed = {
            let mut store = self.lock()?;
            let now = self.clock.now();
            store
                .remove(token.as_bytes())
                .map(|(_, slot)| !slot.is_expired(now))
        };

        match removed {
            Some(true) => {
                self.counters.record_removed(1);
                Ok(true)
            }
            Some(false) => {
                self.counters.record_expired(1);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Drop every entry. Returns the number of entries dropped.
    pub fn clear(&self) -> GuardResult<usize> {
        let dropped = self.lock()?.clear();
        self.counters.record_removed(dropped);
        if dropped > 0 {
            tracing::debug!(dropped, "Cleared uniqueness cache");
        }
        Ok(dropped)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Physically purge every expired entry.
    ///
    /// Purges in batches of `purge_batch`, releasing the lock between
    /// batches so concurrent observers are never held up by a full scan.
    pub fn sweep(&self) -> GuardResult<usize> {
        let batch = self.config.purge_batch;
        let mut total = 0;
        loop {
            let purged = self.sweep_batch(batch)?;
            total += purged;
            if purged < batch {
                break;
            }
        }
        if total > 0 {
            tracing::debug!(purged = total, "Swept expired tokens");
        }
        Ok(total)
    }

    /// Purge at most `max` expired entries under a single lock acquisition.
    pub fn sweep_batch(&self, max: usize) -> GuardResult<usize> {
        let purged = {
            let mut store = self.lock()?;
            let now = self.clock.now();
            store.purge_expired(now, max)
        };
        self.counters.record_expired(purged);
        Ok(purged)
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Number of stored entries, including expired ones not yet purged.
    /// Never exceeds the configured capacity.
    pub fn len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn lock(&self) -> GuardResult<MutexGuard<'_, Store<C>>> {
        self.store.lock().map_err(|_| GuardError::LockPoisoned)
    }

    fn validate_token(&self, token: &Token) -> GuardResult<()> {
        if token.is_empty() {
            return Err(TokenError::Empty.into());
        }
        if token.len() > self.config.max_token_len {
            return Err(TokenError::TooLong {
                len: token.len(),
                max: self.config.max_token_len,
            }
            .into());
        }
        Ok(())
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> GuardResult<Duration> {
        let Some(ttl) = ttl else {
            return Ok(self.config.default_ttl);
        };
        if ttl.is_zero() {
            return Err(GuardError::InvalidTtl {
                ttl,
                reason: "must be positive".to_string(),
            });
        }
        let ceiling = self.config.max_ttl.unwrap_or(TTL_CEILING);
        if ttl > ceiling {
            return Err(GuardError::InvalidTtl {
                ttl,
                reason: format!("must be at most {:?}", ceiling),
            });
        }
        Ok(ttl)
    }
}

impl<C> fmt::Debug for UniquenessCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniquenessCache")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use oncegate_core::{ConfigError, ManualClock};
    use serde_json::json;
    use std::sync::Barrier;
    use std::thread;

    fn manual_cache(config: CacheConfig) -> (UniquenessCache, ManualClock) {
        let clock = ManualClock::new();
        let cache = UniquenessCache::with_clock(config, Arc::new(clock.clone())).unwrap();
        (cache, clock)
    }

    fn config(capacity: usize, ttl_secs: u64) -> CacheConfig {
        CacheConfig::new()
            .with_capacity(capacity)
            .with_default_ttl(Duration::from_secs(ttl_secs))
    }

    #[test]
    fn test_first_observe_accepted_then_duplicate() {
        let (cache, _) = manual_cache(config(10, 60));
        assert_eq!(cache.observe("t").unwrap(), Outcome::Accepted);
        assert_eq!(cache.observe("t").unwrap(), Outcome::Duplicate);
        assert_eq!(cache.observe("t").unwrap(), Outcome::Duplicate);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        let (cache, _) = manual_cache(config(10, 60));
        assert_eq!(cache.observe("Nonce").unwrap(), Outcome::Accepted);
        assert_eq!(cache.observe("nonce").unwrap(), Outcome::Accepted);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (cache, _) = manual_cache(config(3, 60));
        for token in ["a", "b", "c", "d"] {
            assert_eq!(cache.observe(token).unwrap(), Outcome::Accepted);
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a").unwrap());
        assert!(cache.contains("b").unwrap());
        assert!(cache.contains("d").unwrap());

        // "a" was evicted, not merely marked duplicate
        assert_eq!(cache.observe("a").unwrap(), Outcome::Accepted);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("b").unwrap());
        assert_eq!(cache.stats().capacity_evictions, 2);
    }

    #[test]
    fn test_capacity_one_keeps_newest() {
        let (cache, _) = manual_cache(config(1, 60));
        cache.observe("a").unwrap();
        cache.observe("b").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b").unwrap());
        assert_eq!(cache.observe("b").unwrap(), Outcome::Duplicate);
    }

    #[test]
    fn test_expired_token_accepted_again() {
        let (cache, clock) = manual_cache(config(10, 1));
        assert_eq!(cache.observe("x").unwrap(), Outcome::Accepted);

        clock.advance(Duration::from_millis(1000));
        assert_eq!(cache.observe("x").unwrap(), Outcome::Duplicate);

        clock.advance(Duration::from_millis(100));
        assert_eq!(cache.observe("x").unwrap(), Outcome::Accepted);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expired_evictions, 1);
    }

    #[test]
    fn test_observing_duplicate_does_not_extend_lifetime() {
        let (cache, clock) = manual_cache(config(10, 10));
        cache.observe("x").unwrap();
        let inserted_at = cache.peek("x").unwrap().unwrap().inserted_at;

        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.observe("x").unwrap(), Outcome::Duplicate);
        assert_eq!(cache.peek("x").unwrap().unwrap().inserted_at, inserted_at);

        clock.advance(Duration::from_secs(3));
        assert_eq!(cache.observe("x").unwrap(), Outcome::Accepted);
    }

    #[test]
    fn test_per_entry_ttl_override() {
        let (cache, clock) = manual_cache(config(10, 60));
        cache
            .observe_with(ObserveRequest::new("short").with_ttl(Duration::from_secs(1)))
            .unwrap();
        cache.observe("default").unwrap();

        clock.advance(Duration::from_secs(2));
        assert!(!cache.contains("short").unwrap());
        assert!(cache.contains("default").unwrap());
    }

    #[test]
    fn test_owner_distinction() {
        let (cache, _) = manual_cache(config(10, 60));
        let observe = |owner: &str| {
            cache
                .observe_with(ObserveRequest::new("y").with_owner(owner))
                .unwrap()
        };

        assert_eq!(observe("c1"), Outcome::Accepted);
        assert_eq!(observe("c2"), Outcome::DuplicateOtherOwner);
        assert_eq!(observe("c1"), Outcome::Duplicate);
        assert_eq!(cache.observe("y").unwrap(), Outcome::Duplicate);

        let stats = cache.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.duplicate_other_owner, 1);
    }

    #[test]
    fn test_ownerless_entry_never_reports_other_owner() {
        let (cache, _) = manual_cache(config(10, 60));
        cache.observe("z").unwrap();
        let outcome = cache
            .observe_with(ObserveRequest::new("z").with_owner("c1"))
            .unwrap();
        assert_eq!(outcome, Outcome::Duplicate);
    }

    #[test]
    fn test_empty_token_rejected_without_mutation() {
        let (cache, _) = manual_cache(config(10, 60));
        cache.observe("a").unwrap();

        let err = cache.observe("").unwrap_err();
        assert_eq!(err, GuardError::InvalidToken(TokenError::Empty));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().invalid, 1);
        assert!(cache.peek("").is_err());
        assert!(cache.remove("").is_err());
    }

    #[test]
    fn test_oversized_token_rejected() {
        let (cache, _) = manual_cache(config(10, 60).with_max_token_len(4));
        assert!(matches!(
            cache.observe("12345"),
            Err(GuardError::InvalidToken(TokenError::TooLong { len: 5, max: 4 }))
        ));
        assert_eq!(cache.observe("1234").unwrap(), Outcome::Accepted);
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        let (cache, _) = manual_cache(config(10, 60).with_max_ttl(Duration::from_secs(120)));
        let zero = cache.observe_with(ObserveRequest::new("a").with_ttl(Duration::ZERO));
        assert!(matches!(zero, Err(GuardError::InvalidTtl { .. })));

        let too_long =
            cache.observe_with(ObserveRequest::new("a").with_ttl(Duration::from_secs(121)));
        assert!(matches!(too_long, Err(GuardError::InvalidTtl { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_construction_rejects_bad_config() {
        let result: GuardResult<UniquenessCache> =
            UniquenessCache::new(CacheConfig::new().with_default_ttl(Duration::ZERO));
        assert!(matches!(
            result,
            Err(GuardError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_peek_returns_context_and_remaining_ttl() {
        let (cache, clock) = manual_cache(config(10, 60));
        cache
            .observe_with(
                ObserveRequest::new("n")
                    .with_owner("c1")
                    .with_context(json!({"action": "transfer"})),
            )
            .unwrap();

        clock.advance(Duration::from_secs(20));
        let snapshot = cache.peek("n").unwrap().unwrap();
        assert_eq!(snapshot.context, Some(json!({"action": "transfer"})));
        assert_eq!(snapshot.owner, Some(OwnerId::from("c1")));
        assert_eq!(snapshot.ttl, Duration::from_secs(60));
        assert_eq!(snapshot.remaining_ttl, Duration::from_secs(40));

        clock.advance(Duration::from_secs(41));
        assert!(cache.peek("n").unwrap().is_none());
        // Not physically purged by peek
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicate_keeps_original_context() {
        let (cache, _) = manual_cache(config(10, 60));
        cache
            .observe_with(ObserveRequest::new("n").with_context(json!(1)))
            .unwrap();
        cache
            .observe_with(ObserveRequest::new("n").with_context(json!(2)))
            .unwrap();
        assert_eq!(cache.peek("n").unwrap().unwrap().context, Some(json!(1)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (cache, _) = manual_cache(config(10, 60));
        cache.observe("t").unwrap();
        assert!(cache.remove("t").unwrap());
        assert!(!cache.remove("t").unwrap());
        assert!(!cache.remove("never-seen").unwrap());
        assert_eq!(cache.observe("t").unwrap(), Outcome::Accepted);
        assert_eq!(cache.stats().removals, 1);
    }

    #[test]
    fn test_clear() {
        let (cache, _) = manual_cache(config(10, 60));
        cache.observe("a").unwrap();
        cache.observe("b").unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.observe("a").unwrap(), Outcome::Accepted);
    }

    #[test]
    fn test_sweep_purges_in_batches() {
        let (cache, clock) = manual_cache(config(0, 1).with_purge_batch(4));
        for i in 0..10 {
            cache.observe(format!("t{}", i)).unwrap();
        }
        clock.advance(Duration::from_secs(2));
        cache.observe("live").unwrap();

        // observe purged one batch inline
        assert_eq!(cache.len(), 7);
        assert_eq!(cache.sweep().unwrap(), 6);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expired_evictions, 10);
        assert_eq!(cache.sweep().unwrap(), 0);
    }

    #[test]
    fn test_reuse_allowed_mode() {
        let (cache, _) = manual_cache(config(10, 60).with_reuse_mode(ReuseMode::Allow));
        let first = cache
            .observe_with(ObserveRequest::new("r").with_owner("c1").with_context(json!("first")))
            .unwrap();
        let again = cache
            .observe_with(ObserveRequest::new("r").with_owner("c2").with_context(json!("second")))
            .unwrap();

        assert_eq!(first, Outcome::Accepted);
        assert_eq!(again, Outcome::Accepted);
        let snapshot = cache.peek("r").unwrap().unwrap();
        assert_eq!(snapshot.context, Some(json!("first")));
        assert_eq!(snapshot.owner, Some(OwnerId::from("c1")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_observe_single_winner() {
        let cache: Arc<UniquenessCache> = Arc::new(UniquenessCache::new(config(100, 60)).unwrap());
        let barrier = Arc::new(Barrier::new(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.observe("z").unwrap()
                })
            })
            .collect();

        let outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        let duplicates = outcomes.iter().filter(|o| **o == Outcome::Duplicate).count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 9);
    }

    #[test]
    fn test_debug_does_not_require_context_debug() {
        #[derive(Clone)]
        struct Opaque;
        let cache: UniquenessCache<Opaque> = UniquenessCache::new(config(1, 1)).unwrap();
        assert!(format!("{:?}", cache).contains("UniquenessCache"));
    }
}
