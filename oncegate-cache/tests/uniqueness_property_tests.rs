//! Property-Based Tests for the Uniqueness Cache
//!
//! Drives random operation sequences through a cache on a manual clock and
//! compares every result against a straightforward reference model.
//!
//! Properties covered:
//! - uniqueness: first observe is Accepted, repeats are Duplicate or
//!   DuplicateOtherOwner until expiry or removal
//! - expiry: a token is Accepted again once its ttl has elapsed
//! - capacity bound: stored entries never exceed capacity, and the entry
//!   evicted under pressure is the oldest by insertion order
//! - idempotent removal
//! - empty tokens are rejected without changing the size

use oncegate_cache::{
    CacheConfig, GuardError, ManualClock, ObserveRequest, Outcome, OwnerId, TokenError,
    UniquenessCache,
};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const TTL_SECS: u64 = 10;

// ============================================================================
// REFERENCE MODEL
// ============================================================================

#[derive(Debug, Clone)]
struct ModelEntry {
    token: String,
    owner: Option<String>,
    inserted_at: u64,
}

/// FIFO list of entries with a logical clock in whole seconds.
#[derive(Debug, Default)]
struct Model {
    capacity: usize,
    now: u64,
    entries: VecDeque<ModelEntry>,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    fn purge_expired(&mut self) {
        let now = self.now;
        self.entries.retain(|e| now - e.inserted_at <= TTL_SECS);
    }

    fn observe(&mut self, token: &str, owner: Option<&str>) -> Outcome {
        self.purge_expired();
        if let Some(entry) = self.entries.iter().find(|e| e.token == token) {
            return match (entry.owner.as_deref(), owner) {
                (Some(stored), Some(presented)) if stored != presented => {
                    Outcome::DuplicateOtherOwner
                }
                _ => Outcome::Duplicate,
            };
        }
        if self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(ModelEntry {
            token: token.to_string(),
            owner: owner.map(str::to_string),
            inserted_at: self.now,
        });
        Outcome::Accepted
    }

    fn remove(&mut self, token: &str) -> bool {
        let now = self.now;
        let before = self.entries.len();
        let mut live_removed = false;
        self.entries.retain(|e| {
            if e.token == token {
                live_removed = now - e.inserted_at <= TTL_SECS;
                false
            } else {
                true
            }
        });
        live_removed && before != self.entries.len()
    }

    fn is_live(&self, token: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.token == token && self.now - e.inserted_at <= TTL_SECS)
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Observe { token: u8, owner: Option<u8> },
    Remove { token: u8 },
    Advance { secs: u64 },
    Sweep,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u8..12, proptest::option::of(0u8..3))
            .prop_map(|(token, owner)| Op::Observe { token, owner }),
        1 => (0u8..12).prop_map(|token| Op::Remove { token }),
        2 => (0u64..8).prop_map(|secs| Op::Advance { secs }),
        1 => Just(Op::Sweep),
        1 => Just(Op::Clear),
    ]
}

fn token_name(i: u8) -> String {
    format!("tok-{}", i)
}

fn owner_name(i: u8) -> String {
    format!("client-{}", i)
}

fn build(capacity: usize) -> (UniquenessCache<()>, ManualClock) {
    let clock = ManualClock::new();
    let cache = UniquenessCache::with_clock(
        CacheConfig::new()
            .with_capacity(capacity)
            .with_default_ttl(Duration::from_secs(TTL_SECS))
            .with_purge_batch(1_000),
        Arc::new(clock.clone()),
    )
    .expect("valid config");
    (cache, clock)
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_matches_reference_model(
        capacity in 0usize..6,
        ops in proptest::collection::vec(op_strategy(), 1..80),
    ) {
        let (cache, clock) = build(capacity);
        let mut model = Model::new(capacity);

        for op in ops {
            match op {
                Op::Observe { token, owner } => {
                    let name = token_name(token);
                    let owner_str = owner.map(owner_name);
                    let mut request = ObserveRequest::new(name.as_str());
                    if let Some(o) = &owner_str {
                        request = request.with_owner(OwnerId::from(o.as_str()));
                    }
                    let got = cache.observe_with(request).unwrap();
                    let expected = model.observe(&name, owner_str.as_deref());
                    prop_assert_eq!(got, expected);
                }
                Op::Remove { token } => {
                    let name = token_name(token);
                    prop_assert_eq!(cache.remove(name.as_str()).unwrap(), model.remove(&name));
                }
                Op::Advance { secs } => {
                    clock.advance(Duration::from_secs(secs));
                    model.now += secs;
                }
                Op::Sweep => {
                    cache.sweep().unwrap();
                    model.purge_expired();
                    prop_assert_eq!(cache.len(), model.entries.len());
                }
                Op::Clear => {
                    cache.clear().unwrap();
                    model.entries.clear();
                }
            }

            if capacity > 0 {
                prop_assert!(cache.len() <= capacity);
            }
            for i in 0..12u8 {
                let name = token_name(i);
                prop_assert_eq!(cache.contains(name.as_str()).unwrap(), model.is_live(&name));
            }
        }
    }

    #[test]
    fn prop_first_observe_accepted_repeat_duplicate(
        tokens in proptest::collection::hash_set("[a-zA-Z0-9]{1,16}", 1..40),
    ) {
        let (cache, _) = build(0);
        for token in &tokens {
            prop_assert_eq!(cache.observe(token.as_str()).unwrap(), Outcome::Accepted);
        }
        for token in &tokens {
            prop_assert_eq!(cache.observe(token.as_str()).unwrap(), Outcome::Duplicate);
        }
        prop_assert_eq!(cache.len(), tokens.len());
    }

    #[test]
    fn prop_capacity_evicts_in_insertion_order(
        capacity in 1usize..8,
        extra in 1usize..8,
    ) {
        let (cache, _) = build(capacity);
        let total = capacity + extra;
        for i in 0..total {
            prop_assert_eq!(cache.observe(format!("t{}", i)).unwrap(), Outcome::Accepted);
            prop_assert!(cache.len() <= capacity);
        }
        for i in 0..total {
            let live = cache.contains(format!("t{}", i)).unwrap();
            prop_assert_eq!(live, i >= extra, "token t{} liveness", i);
        }
        prop_assert_eq!(cache.stats().capacity_evictions, extra as u64);
    }

    #[test]
    fn prop_remove_then_observe_accepts(token in "[a-z]{1,12}") {
        let (cache, _) = build(16);
        cache.observe(token.as_str()).unwrap();
        prop_assert!(cache.remove(token.as_str()).unwrap());
        prop_assert!(!cache.remove(token.as_str()).unwrap());
        prop_assert_eq!(cache.observe(token.as_str()).unwrap(), Outcome::Accepted);
    }

    #[test]
    fn prop_empty_token_never_changes_size(prefill in 0usize..10) {
        let (cache, _) = build(32);
        for i in 0..prefill {
            cache.observe(format!("p{}", i)).unwrap();
        }
        let before = cache.len();
        let err = cache.observe("").unwrap_err();
        prop_assert_eq!(err, GuardError::InvalidToken(TokenError::Empty));
        let err = cache.observe(Vec::<u8>::new()).unwrap_err();
        prop_assert_eq!(err, GuardError::InvalidToken(TokenError::Empty));
        prop_assert_eq!(cache.len(), before);
    }
}
