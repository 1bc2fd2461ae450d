//! Fuzz test for the uniqueness cache
//!
//! Decodes arbitrary bytes into a sequence of cache operations on a manual
//! clock and checks, after every step:
//! - stored entries never exceed a non-zero capacity
//! - a token that was just accepted is reported as a duplicate on an
//!   immediate repeat (nothing can expire or evict it in between)
//! - invalid tokens never change the stored size
//!
//! Run with: cargo +nightly fuzz run observe_ops_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use oncegate_cache::{
    CacheConfig, ManualClock, ObserveRequest, Outcome, ReuseMode, UniquenessCache,
};
use std::sync::Arc;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let Some((&header, ops)) = data.split_first() else {
        return;
    };

    let capacity = (header & 0x0f) as usize;
    let reuse_mode = if header & 0x80 != 0 {
        ReuseMode::Allow
    } else {
        ReuseMode::Reject
    };
    let clock = ManualClock::new();
    let cache: UniquenessCache<()> = match UniquenessCache::with_clock(
        CacheConfig::new()
            .with_capacity(capacity)
            .with_default_ttl(Duration::from_secs(8))
            .with_max_ttl(Duration::from_secs(32))
            .with_purge_batch(((header >> 4) & 0x07) as usize + 1)
            .with_reuse_mode(reuse_mode),
        Arc::new(clock.clone()),
    ) {
        Ok(cache) => cache,
        Err(_) => return,
    };

    for chunk in ops.chunks(2) {
        let op = chunk[0];
        let arg = chunk.get(1).copied().unwrap_or(0);
        let token = [b't', arg & 0x1f];

        match op % 6 {
            0 | 1 => {
                let mut request = ObserveRequest::new(token);
                if op & 0x10 != 0 {
                    request = request.with_owner(format!("o{}", arg >> 6));
                }
                if op & 0x20 != 0 {
                    request = request.with_ttl(Duration::from_secs(u64::from(arg >> 5)));
                }
                let owner = request.owner.clone();
                let ttl_is_zero = request.ttl == Some(Duration::ZERO);
                match cache.observe_with(request) {
                    Ok(Outcome::Accepted) => {
                        let mut again = ObserveRequest::new(token);
                        again.owner = owner;
                        let repeat = cache.observe_with(again).expect("repeat observe");
                        if reuse_mode == ReuseMode::Reject {
                            assert_eq!(repeat, Outcome::Duplicate);
                        } else {
                            assert_eq!(repeat, Outcome::Accepted);
                        }
                    }
                    Ok(_) => {}
                    Err(_) => assert!(ttl_is_zero, "only a zero ttl can be rejected here"),
                }
            }
            2 => {
                let _ = cache.remove(token).expect("remove");
            }
            3 => clock.advance(Duration::from_millis(u64::from(arg) * 50)),
            4 => {
                let before = cache.len();
                cache.sweep().expect("sweep");
                assert!(cache.len() <= before);
            }
            _ => {
                let before = cache.len();
                assert!(cache.observe(Vec::<u8>::new()).is_err());
                assert_eq!(cache.len(), before);
            }
        }

        if capacity > 0 {
            assert!(cache.len() <= capacity, "capacity bound violated");
        }
    }
});
