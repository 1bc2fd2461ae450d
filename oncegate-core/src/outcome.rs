//! Result of presenting a token to the access gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What `observe` decided about a token.
///
/// All three variants are successful answers from a working cache. Only
/// `Accepted` means the caller may proceed; the duplicate variants are the
/// cache doing its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The token was absent (or had expired) and is now live.
    Accepted,
    /// The token is live and was presented again by the same owner, or
    /// without owner distinction.
    Duplicate,
    /// The token is live and bound to a different owner than the one
    /// presented now.
    DuplicateOtherOwner,
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    /// True for both duplicate variants.
    pub fn is_duplicate(&self) -> bool {
        !self.is_accepted()
    }

    /// Stable label, used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Duplicate => "duplicate",
            Outcome::DuplicateOtherOwner => "duplicate_other_owner",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
