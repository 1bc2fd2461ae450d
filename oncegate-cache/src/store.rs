//! The authoritative token map and its ordering indexes.
//!
//! Every entry is reachable three ways, and the three views are kept in
//! lockstep by the methods here:
//!
//! - `entries`: token -> slot, for O(1) membership checks
//! - `by_insertion`: sequence number -> token, for FIFO capacity eviction
//! - `by_expiry`: (expires_at, sequence number) -> (), for age eviction
//!
//! Sequence numbers increase strictly per store, so they break ties between
//! entries inserted at the same instant deterministically.

use oncegate_core::{EntrySnapshot, OwnerId, Timestamp, Token};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

/// One tracked token's arrival metadata.
#[derive(Debug, Clone)]
pub(crate) struct Slot<C> {
    pub seq: u64,
    pub inserted_at: Instant,
    pub expires_at: Instant,
    pub observed_at: Timestamp,
    pub ttl: Duration,
    pub owner: Option<OwnerId>,
    pub context: Option<C>,
}

impl<C> Slot<C> {
    /// An entry is expired once `now - inserted_at > ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

impl<C: Clone> Slot<C> {
    pub fn snapshot(&self, token: &Token, now: Instant) -> EntrySnapshot<C> {
        EntrySnapshot {
            token: token.clone(),
            owner: self.owner.clone(),
            context: self.context.clone(),
            inserted_at: self.inserted_at,
            observed_at: self.observed_at,
            ttl: self.ttl,
            remaining_ttl: self.remaining(now),
        }
    }
}

/// What a new entry is created from.
#[derive(Debug)]
pub(crate) struct NewEntry<C> {
    pub token: Token,
    pub now: Instant,
    pub ttl: Duration,
    pub owner: Option<OwnerId>,
    pub context: Option<C>,
}

#[derive(Debug)]
pub(crate) struct Store<C> {
    entries: HashMap<Token, Slot<C>>,
    by_insertion: BTreeMap<u64, Token>,
    by_expiry: BTreeSet<(Instant, u64)>,
    next_seq: u64,
}

impl<C> Store<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_insertion: BTreeMap::new(),
            by_expiry: BTreeSet::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Raw lookup, including entries that are expired but not yet purged.
    #[cfg(test)]
    pub fn get(&self, token: &[u8]) -> Option<&Slot<C>> {
        self.entries.get(token)
    }

    /// Lookup that treats expired entries as absent.
    pub fn get_live(&self, token: &[u8], now: Instant) -> Option<&Slot<C>> {
        self.entries.get(token).filter(|slot| !slot.is_expired(now))
    }

    /// Insert a token that is not currently stored. Returns its sequence
    /// number.
    ///
    /// Callers must remove any stale slot for the same token first;
    /// overwriting would orphan the old slot's index keys.
    pub fn insert(&mut self, entry: NewEntry<C>) -> u64 {
        debug_assert!(!self.entries.contains_key(entry.token.as_bytes()));

        let seq = self.next_seq;
        self.next_seq += 1;

        let expires_at = entry.now + entry.ttl;
        self.by_insertion.insert(seq, entry.token.clone());
        self.by_expiry.insert((expires_at, seq));
        self.entries.insert(
            entry.token,
            Slot {
                seq,
                inserted_at: entry.now,
                expires_at,
                observed_at: chrono::Utc::now(),
                ttl: entry.ttl,
                owner: entry.owner,
                context: entry.context,
            },
        );
        seq
    }

    /// Remove a token from the map and both indexes.
    pub fn remove(&mut self, token: &[u8]) -> Option<(Token, Slot<C>)> {
        let (token, slot) = self.entries.remove_entry(token)?;
        self.by_insertion.remove(&slot.seq);
        self.by_expiry.remove(&(slot.expires_at, slot.seq));
        Some((token, slot))
    }

    /// Remove the oldest entry by insertion order.
    pub fn pop_oldest(&mut self) -> Option<(Token, Slot<C>)> {
        let (_, token) = self.by_insertion.pop_first()?;
        let slot = self.entries.remove(token.as_bytes())?;
        self.by_expiry.remove(&(slot.expires_at, slot.seq));
        Some((token, slot))
    }

    /// Remove the entry that expires soonest, if it has already expired.
    pub fn pop_expired(&mut self, now: Instant) -> Option<(Token, Slot<C>)> {
        let &(expires_at, seq) = self.by_expiry.first()?;
        if now <= expires_at {
            return None;
        }
        self.by_expiry.pop_first();
        let token = self.by_insertion.remove(&seq)?;
        let slot = self.entries.remove(token.as_bytes())?;
        Some((token, slot))
    }

    /// Drop everything. Sequence numbers keep increasing across clears.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.by_insertion.clear();
        self.by_expiry.clear();
        dropped
    }

    /// Check that the three views agree.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        self.entries.len() == self.by_insertion.len()
            && self.entries.len() == self.by_expiry.len()
            && self.entries.iter().all(|(token, slot)| {
                self.by_insertion.get(&slot.seq) == Some(token)
                    && self.by_expiry.contains(&(slot.expires_at, slot.seq))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_entry(token: &str, now: Instant, ttl_secs: u64) -> NewEntry<()> {
        NewEntry {
            token: Token::from(token),
            now,
            ttl: Duration::from_secs(ttl_secs),
            owner: None,
            context: None,
        }
    }

    #[test]
    fn test_insert_and_remove_keep_indexes_in_sync() {
        let now = Instant::now();
        let mut store = Store::new();
        store.insert(new_entry("a", now, 10));
        store.insert(new_entry("b", now, 10));
        assert_eq!(store.len(), 2);
        assert!(store.is_consistent());

        let (token, _) = store.remove(b"a").unwrap();
        assert_eq!(token, Token::from("a"));
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent());
        assert!(store.remove(b"a").is_none());
    }

    #[test]
    fn test_pop_oldest_breaks_ties_by_insertion_order() {
        let now = Instant::now();
        let mut store = Store::new();
        for token in ["first", "second", "third"] {
            store.insert(new_entry(token, now, 10));
        }

        let order: Vec<Token> = std::iter::from_fn(|| store.pop_oldest().map(|(t, _)| t)).collect();
        assert_eq!(
            order,
            vec![Token::from("first"), Token::from("second"), Token::from("third")]
        );
        assert!(store.is_consistent());
    }

    #[test]
    fn test_pop_expired_follows_expiry_not_insertion() {
        let now = Instant::now();
        let mut store = Store::new();
        store.insert(new_entry("long", now, 100));
        store.insert(new_entry("short", now, 1));

        assert!(store.pop_expired(now + Duration::from_secs(1)).is_none());

        let (token, _) = store.pop_expired(now + Duration::from_secs(2)).unwrap();
        assert_eq!(token, Token::from("short"));
        assert!(store.pop_expired(now + Duration::from_secs(2)).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_get_live_hides_expired() {
        let now = Instant::now();
        let mut store = Store::new();
        store.insert(new_entry("x", now, 1));

        assert!(store.get_live(b"x", now + Duration::from_secs(1)).is_some());
        assert!(store.get_live(b"x", now + Duration::from_millis(1001)).is_none());
        assert!(store.get(b"x").is_some());
    }

    #[test]
    fn test_clear() {
        let now = Instant::now();
        let mut store = Store::new();
        store.insert(new_entry("a", now, 1));
        store.insert(new_entry("b", now, 1));
        assert_eq!(store.clear(), 2);
        assert_eq!(store.len(), 0);
        assert!(store.is_consistent());

        let seq = store.insert(new_entry("a", now, 1));
        assert_eq!(seq, 2);
    }
}
