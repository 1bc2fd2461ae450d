//! Error types for oncegate operations
//!
//! `Duplicate` and `DuplicateOtherOwner` are outcomes, not errors; nothing
//! here represents a successful uniqueness check. No message in this module
//! carries token content.

use std::time::Duration;
use thiserror::Error;

/// Rejections of the token itself, raised before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is empty")]
    Empty,

    #[error("Token length {len} exceeds maximum of {max} bytes")]
    TooLong { len: usize, max: usize },
}

/// Construction-time configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Capacity misconfigured ({value}): {reason}")]
    CapacityMisconfigured { value: String, reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },

    #[error("Failed to read settings: {reason}")]
    Io { reason: String },

    #[error("Failed to parse settings: {reason}")]
    Parse { reason: String },
}

/// Master error type for all oncegate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Invalid ttl {ttl:?}: {reason}")]
    InvalidTtl { ttl: Duration, reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl GuardError {
    /// True for errors caused by caller input rather than cache state.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidToken(_) | Self::InvalidTtl { .. })
    }
}

/// Result type alias for oncegate operations.
pub type GuardResult<T> = Result<T, GuardError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display_too_long() {
        let err = TokenError::TooLong { len: 2048, max: 1024 };
        let msg = format!("{}", err);
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn test_guard_error_from_token_error() {
        let err: GuardError = TokenError::Empty.into();
        assert_eq!(err, GuardError::InvalidToken(TokenError::Empty));
        assert!(err.is_caller_error());
        assert!(format!("{}", err).contains("Invalid token"));
    }

    #[test]
    fn test_config_error_display_capacity() {
        let err = ConfigError::CapacityMisconfigured {
            value: "-5".to_string(),
            reason: "must not be negative".to_string(),
        };
        let msg = format!("{}", GuardError::from(err));
        assert!(msg.contains("Config error"));
        assert!(msg.contains("-5"));
        assert!(msg.contains("must not be negative"));
    }

    #[test]
    fn test_lock_poisoned_is_not_caller_error() {
        assert!(!GuardError::LockPoisoned.is_caller_error());
        let cfg: GuardError = ConfigError::Io {
            reason: "missing".to_string(),
        }
        .into();
        assert!(!cfg.is_caller_error());
    }
}
