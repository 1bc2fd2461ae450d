//! Service-level errors.
//!
//! Cache errors pass through unchanged as [`ServiceError::Guard`]; the other
//! variants cover the ambient runtime (metrics registry, tracing setup).

use oncegate_core::GuardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("Failed to register metric {metric}: {reason}")]
    MetricsRegistration { metric: &'static str, reason: String },

    #[error("Failed to encode metrics: {reason}")]
    MetricsEncode { reason: String },

    #[error("Failed to initialize tracing: {reason}")]
    Telemetry { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
