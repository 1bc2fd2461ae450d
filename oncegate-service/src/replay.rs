//! Nonce replay protection.
//!
//! A [`ReplayGuard`] admits each nonce once per window. Replays, nonces
//! presented by a client other than the one that first used them, and
//! missing or malformed nonces are turned into a [`ReplayRejection`] whose
//! message never echoes the nonce back.

use std::sync::Arc;
use std::time::Duration;

use oncegate_cache::UniquenessCache;
use oncegate_core::{GuardError, ObserveRequest, Outcome, OwnerId, Token};
use thiserror::Error;

use crate::metrics::GuardMetrics;

/// Why a nonce was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReplayRejection {
    #[error("Nonce missing or malformed")]
    Invalid,

    #[error("Nonce already used")]
    Replayed,

    #[error("Nonce issued to a different client")]
    CrossClient,

    #[error("Replay protection unavailable")]
    Unavailable,
}

impl ReplayRejection {
    /// Stable machine-readable code for API responses and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            ReplayRejection::Invalid => "NONCE_INVALID",
            ReplayRejection::Replayed => "NONCE_REPLAYED",
            ReplayRejection::CrossClient => "NONCE_CROSS_CLIENT",
            ReplayRejection::Unavailable => "REPLAY_GUARD_UNAVAILABLE",
        }
    }

    /// True when the caller sent something wrong, as opposed to the guard
    /// itself being unable to decide.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, ReplayRejection::Unavailable)
    }
}

impl From<GuardError> for ReplayRejection {
    fn from(err: GuardError) -> Self {
        if err.is_caller_error() {
            ReplayRejection::Invalid
        } else {
            ReplayRejection::Unavailable
        }
    }
}

/// Nonce validation backed by a shared uniqueness cache.
///
/// `C` is the context remembered per nonce (for example the action the
/// nonce was issued for).
#[derive(Debug, Clone)]
pub struct ReplayGuard<C = serde_json::Value> {
    cache: Arc<UniquenessCache<C>>,
    nonce_ttl: Option<Duration>,
    metrics: Option<(Arc<GuardMetrics>, String)>,
}

impl<C: Clone + Send> ReplayGuard<C> {
    pub fn new(cache: Arc<UniquenessCache<C>>) -> Self {
        Self {
            cache,
            nonce_ttl: None,
            metrics: None,
        }
    }

    /// Use `ttl` for every nonce instead of the cache default.
    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = Some(ttl);
        self
    }

    /// Record every check under `domain` in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<GuardMetrics>, domain: impl Into<String>) -> Self {
        self.metrics = Some((metrics, domain.into()));
        self
    }

    /// Admit `nonce` for `client`, or say why not.
    pub fn check(
        &self,
        nonce: Option<&str>,
        client: Option<&OwnerId>,
    ) -> Result<(), ReplayRejection> {
        self.check_inner(nonce, client, None)
    }

    /// Like [`check`](Self::check), remembering `context` if the nonce is
    /// admitted.
    pub fn check_with_context(
        &self,
        nonce: Option<&str>,
        client: Option<&OwnerId>,
        context: C,
    ) -> Result<(), ReplayRejection> {
        self.check_inner(nonce, client, Some(context))
    }

    /// Context stored when `nonce` was admitted, while it is still live.
    pub fn issued_for(&self, nonce: &str) -> Result<Option<C>, ReplayRejection> {
        let snapshot = self.cache.peek(nonce)?;
        Ok(snapshot.and_then(|s| s.context))
    }

    fn check_inner(
        &self,
        nonce: Option<&str>,
        client: Option<&OwnerId>,
        context: Option<C>,
    ) -> Result<(), ReplayRejection> {
        let Some(nonce) = nonce else {
            tracing::debug!("Rejected request without nonce");
            return Err(ReplayRejection::Invalid);
        };

        let mut request = ObserveRequest::new(Token::from(nonce));
        request.owner = client.cloned();
        request.ttl = self.nonce_ttl;
        request.context = context;

        let result = self.cache.observe_with(request);
        if let Some((metrics, domain)) = &self.metrics {
            metrics.record_observation(domain, &result);
        }

        match result? {
            Outcome::Accepted => Ok(()),
            Outcome::Duplicate => {
                tracing::debug!(client = ?client.map(OwnerId::as_str), "Nonce replay rejected");
                Err(ReplayRejection::Replayed)
            }
            Outcome::DuplicateOtherOwner => Err(ReplayRejection::CrossClient),
        }
    }
}
