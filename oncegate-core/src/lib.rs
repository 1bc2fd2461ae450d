//! ONCEGATE Core - Token and Outcome Types
//!
//! Pure data structures shared by every oncegate crate. The cache itself
//! lives in `oncegate-cache`; this crate holds only the vocabulary used at
//! its boundary: tokens, owners, outcomes, configuration and errors.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod outcome;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, ReuseMode, MAX_CAPACITY, TTL_CEILING};
pub use entry::{EntrySnapshot, ObserveRequest};
pub use error::{ConfigError, GuardError, GuardResult, TokenError};
pub use outcome::Outcome;

/// Timestamp type using UTC timezone. Informational only; expiry is
/// computed from the monotonic [`Clock`].
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// SHA-256 digest of a token, used for log correlation.
pub type TokenDigest = [u8; 32];

/// Number of hex characters shown in a token fingerprint.
const FINGERPRINT_HEX_LEN: usize = 12;

// ============================================================================
// TOKEN
// ============================================================================

/// An opaque token tracked by the uniqueness cache.
///
/// Equality and hashing are byte-exact and case-sensitive. Callers normalize
/// their identifiers (nonces, signatures, transaction ids) into a `Token`
/// before presenting them; nothing downstream inspects the content.
///
/// `Debug` and `Display` print a fingerprint, never the raw bytes, so a
/// token can be logged without reflecting it back to anyone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(Box<[u8]>);

impl Token {
    /// Create a token from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into().into_boxed_slice())
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty token, which the cache always rejects.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 digest of the token bytes.
    pub fn digest(&self) -> TokenDigest {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        digest
    }

    /// Short, non-reversible identifier safe for logs and error messages.
    pub fn fingerprint(&self) -> String {
        let mut hex = hex::encode(self.digest());
        hex.truncate(FINGERPRINT_HEX_LEN);
        format!("fp:{}", hex)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.fingerprint()).finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

impl Borrow<[u8]> for Token {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<&String> for Token {
    fn from(s: &String) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<&[u8]> for Token {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Token {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl<const N: usize> From<[u8; N]> for Token {
    fn from(bytes: [u8; N]) -> Self {
        Self::new(bytes.to_vec())
    }
}

/// UUIDs are canonicalized to their lowercase hyphenated text form so that a
/// transaction id submitted as a `Uuid` and as a string collide.
impl From<Uuid> for Token {
    fn from(id: Uuid) -> Self {
        Self::new(id.hyphenated().to_string().into_bytes())
    }
}

// ============================================================================
// OWNER
// ============================================================================

/// Identifier of the client or session a token was first accepted for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for OwnerId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
