//! ONCEGATE Test Utilities
//!
//! Shared test infrastructure for the ONCEGATE workspace:
//! - Proptest generators for tokens, owners and operation sequences
//! - Fixtures for caches on a manual clock
//! - Assertions for gate outcomes and error variants

// Re-export the types most tests touch
pub use oncegate_cache::{CacheStats, EvictionReason, UniquenessCache};
pub use oncegate_core::{
    CacheConfig, ConfigError, GuardError, GuardResult, ManualClock, ObserveRequest, Outcome,
    OwnerId, ReuseMode, Token, TokenError,
};

use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating ONCEGATE inputs.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Printable nonce-like token, 1 to 64 chars.
    pub fn arb_token_str() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,64}"
    }

    /// Arbitrary non-empty token bytes, including non-UTF-8.
    pub fn arb_token_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 1..128)
    }

    pub fn arb_token() -> impl Strategy<Value = Token> {
        prop_oneof![
            arb_token_str().prop_map(Token::from),
            arb_token_bytes().prop_map(Token::from),
            any::<[u8; 16]>().prop_map(|b| Token::from(Uuid::from_bytes(b))),
        ]
    }

    /// Token drawn from a small alphabet so sequences repeat often.
    pub fn arb_colliding_token(pool: u8) -> impl Strategy<Value = Token> {
        (0..pool.max(1)).prop_map(|i| Token::from(format!("tok-{}", i)))
    }

    pub fn arb_owner() -> impl Strategy<Value = OwnerId> {
        "client-[a-z0-9]{1,8}".prop_map(OwnerId::from)
    }

    pub fn arb_optional_owner() -> impl Strategy<Value = Option<OwnerId>> {
        prop::option::of(arb_owner())
    }

    pub fn arb_reuse_mode() -> impl Strategy<Value = ReuseMode> {
        prop_oneof![Just(ReuseMode::Reject), Just(ReuseMode::Allow)]
    }

    /// Valid configuration with a small capacity and a TTL in seconds.
    pub fn arb_small_config() -> impl Strategy<Value = CacheConfig> {
        (0usize..32, 1u64..120, 1usize..128, arb_reuse_mode()).prop_map(
            |(capacity, ttl_secs, purge_batch, mode)| {
                CacheConfig::new()
                    .with_capacity(capacity)
                    .with_default_ttl(Duration::from_secs(ttl_secs))
                    .with_purge_batch(purge_batch)
                    .with_reuse_mode(mode)
            },
        )
    }

    /// Sequence of tokens where roughly half are repeats.
    pub fn arb_token_sequence(max_len: usize) -> impl Strategy<Value = Vec<Token>> {
        prop::collection::vec(arb_colliding_token(16), 1..max_len.max(2))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built caches and configurations for common scenarios.

    use super::*;

    /// Capacity 100, TTL 60s, defaults elsewhere.
    pub fn small_config() -> CacheConfig {
        CacheConfig::new()
            .with_capacity(100)
            .with_default_ttl(Duration::from_secs(60))
    }

    /// A cache on a [`ManualClock`]. Keep the returned clock to move time.
    pub fn manual_cache<C: Clone + Send>(config: CacheConfig) -> (UniquenessCache<C>, ManualClock) {
        let clock = ManualClock::new();
        let cache = match UniquenessCache::with_clock(config, Arc::new(clock.clone())) {
            Ok(cache) => cache,
            Err(err) => panic!("fixture config rejected: {}", err),
        };
        (cache, clock)
    }

    /// Shared variant of [`manual_cache`] for adapter and threaded tests.
    pub fn shared_manual_cache<C: Clone + Send>(
        config: CacheConfig,
    ) -> (Arc<UniquenessCache<C>>, ManualClock) {
        let (cache, clock) = manual_cache(config);
        (Arc::new(cache), clock)
    }

    /// A cache on the real clock, shared behind an `Arc`.
    pub fn shared_cache<C: Clone + Send>(config: CacheConfig) -> Arc<UniquenessCache<C>> {
        match UniquenessCache::new(config) {
            Ok(cache) => Arc::new(cache),
            Err(err) => panic!("fixture config rejected: {}", err),
        }
    }

    /// `count` distinct tokens `prefix-0 .. prefix-{count-1}`.
    pub fn tokens(prefix: &str, count: usize) -> Vec<Token> {
        (0..count)
            .map(|i| Token::from(format!("{}-{}", prefix, i)))
            .collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for gate outcomes and error variants.

    use super::*;

    /// Exactly one `Accepted`; every other outcome is a duplicate.
    #[track_caller]
    pub fn assert_single_winner(outcomes: &[Outcome]) {
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        assert_eq!(
            accepted, 1,
            "expected exactly one Accepted among {} outcomes, got {}: {:?}",
            outcomes.len(),
            accepted,
            outcomes
        );
        assert!(
            outcomes.iter().all(|o| o.is_accepted() || o.is_duplicate()),
            "unexpected outcome in {:?}",
            outcomes
        );
    }

    #[track_caller]
    pub fn assert_accepted(result: &GuardResult<Outcome>) {
        match result {
            Ok(Outcome::Accepted) => {}
            other => panic!("Expected Accepted, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_duplicate(result: &GuardResult<Outcome>) {
        match result {
            Ok(outcome) if outcome.is_duplicate() => {}
            other => panic!("Expected a duplicate outcome, got: {:?}", other),
        }
    }

    /// Assert that a result is an `InvalidToken` error.
    #[track_caller]
    pub fn assert_invalid_token<T: std::fmt::Debug>(result: &GuardResult<T>) {
        match result {
            Err(GuardError::InvalidToken(_)) => {}
            other => panic!("Expected InvalidToken error, got: {:?}", other),
        }
    }

    /// Assert that a result is a `Config` error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &GuardResult<T>) {
        match result {
            Err(GuardError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Stored entries never exceed a non-zero capacity.
    #[track_caller]
    pub fn assert_within_capacity<C: Clone + Send>(cache: &UniquenessCache<C>) {
        let capacity = cache.capacity();
        if capacity > 0 {
            assert!(
                cache.len() <= capacity,
                "cache holds {} entries over capacity {}",
                cache.len(),
                capacity
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
