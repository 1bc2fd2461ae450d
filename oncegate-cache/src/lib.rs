//! ONCEGATE Cache - Bounded Time-Windowed Uniqueness Cache
//!
//! Decides, exactly once per token, whether it has been seen before, and
//! forgets it after a bounded time or when capacity is exceeded. This backs
//! replay prevention, idempotent submission and request deduplication.
//!
//! # Structure
//!
//! - `store`: the token map plus insertion-order and expiry-order indexes
//! - `eviction`: age-based purge and capacity-based oldest-first eviction
//! - `cache`: the [`UniquenessCache`] and its atomic `observe` gate
//! - `stats`: lock-free usage counters
//!
//! Everything observable goes through [`UniquenessCache`]; the store and
//! eviction policies have no public surface of their own.

mod cache;
pub mod eviction;
mod stats;
mod store;

pub use cache::UniquenessCache;
pub use eviction::EvictionReason;
pub use stats::CacheStats;

// Re-export the boundary vocabulary so most callers need only this crate.
pub use oncegate_core::{
    CacheConfig, Clock, ConfigError, EntrySnapshot, GuardError, GuardResult, ManualClock,
    ObserveRequest, Outcome, OwnerId, ReuseMode, SystemClock, Token, TokenError,
};
