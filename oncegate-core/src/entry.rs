//! Request and snapshot types exchanged with the cache.

use crate::{OwnerId, Timestamp, Token};
use std::time::{Duration, Instant};

/// A token presented to the access gate, with its optional metadata.
///
/// Built with the `with_*` methods:
///
/// ```
/// use oncegate_core::{ObserveRequest, OwnerId};
/// use std::time::Duration;
///
/// let request: ObserveRequest = ObserveRequest::new("nonce-42")
///     .with_owner(OwnerId::from("client-a"))
///     .with_ttl(Duration::from_secs(30))
///     .with_context(serde_json::json!({"action": "transfer"}));
/// assert_eq!(request.ttl, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone)]
pub struct ObserveRequest<C = serde_json::Value> {
    pub token: Token,
    pub owner: Option<OwnerId>,
    /// Overrides the cache's default TTL for this entry only.
    pub ttl: Option<Duration>,
    /// Stored on acceptance and returned by `peek`; ignored for duplicates.
    pub context: Option<C>,
}

impl<C> ObserveRequest<C> {
    pub fn new(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            owner: None,
            ttl: None,
            context: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }
}

/// Read-only view of a live entry, as returned by `peek`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<C = serde_json::Value> {
    pub token: Token,
    pub owner: Option<OwnerId>,
    pub context: Option<C>,
    /// Monotonic acceptance time; the only input to expiry.
    pub inserted_at: Instant,
    /// Wall-clock acceptance time, for display and audit.
    pub observed_at: Timestamp,
    /// Effective TTL (per-entry override or the cache default).
    pub ttl: Duration,
    /// TTL left as of the `peek` that produced this snapshot.
    pub remaining_ttl: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_request_builder() {
        let request: ObserveRequest<u32> = ObserveRequest::new("t")
            .with_owner("c1")
            .with_ttl(Duration::from_secs(9))
            .with_context(7);

        assert_eq!(request.token, Token::from("t"));
        assert_eq!(request.owner, Some(OwnerId::from("c1")));
        assert_eq!(request.ttl, Some(Duration::from_secs(9)));
        assert_eq!(request.context, Some(7));
    }
}
