//! First-writer-wins gate for transaction and job ids.

use std::sync::Arc;

use oncegate_cache::UniquenessCache;
use oncegate_core::{GuardResult, ObserveRequest, OwnerId, Token};

use crate::metrics::GuardMetrics;

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the submission and should process it.
    Granted,
    /// The id was already claimed inside the window.
    AlreadyClaimed,
}

impl Claim {
    pub fn is_granted(&self) -> bool {
        matches!(self, Claim::Granted)
    }
}

/// Guards against double submission of the same id.
///
/// A caller that gets [`Claim::Granted`] and then fails can
/// [`release`](SubmissionGate::release) the id so a retry is not rejected.
#[derive(Debug, Clone)]
pub struct SubmissionGate<C = serde_json::Value> {
    cache: Arc<UniquenessCache<C>>,
    metrics: Option<(Arc<GuardMetrics>, String)>,
}

impl<C: Clone + Send> SubmissionGate<C> {
    pub fn new(cache: Arc<UniquenessCache<C>>) -> Self {
        Self {
            cache,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GuardMetrics>, domain: impl Into<String>) -> Self {
        self.metrics = Some((metrics, domain.into()));
        self
    }

    /// Claim `id`. Exactly one concurrent caller gets `Granted`.
    pub fn claim(&self, id: impl Into<Token>) -> GuardResult<Claim> {
        self.claim_request(ObserveRequest::new(id))
    }

    /// Claim `id` on behalf of `submitter`, attaching `context`.
    pub fn claim_as(
        &self,
        id: impl Into<Token>,
        submitter: impl Into<OwnerId>,
        context: C,
    ) -> GuardResult<Claim> {
        self.claim_request(
            ObserveRequest::new(id)
                .with_owner(submitter)
                .with_context(context),
        )
    }

    /// Give up a claim so the id can be submitted again. Returns whether a
    /// live claim was dropped.
    pub fn release(&self, id: impl Into<Token>) -> GuardResult<bool> {
        let id = id.into();
        let released = self.cache.remove(id.clone())?;
        if released {
            tracing::debug!(id = %id, "Released submission claim");
        }
        Ok(released)
    }

    pub fn is_claimed(&self, id: impl Into<Token>) -> GuardResult<bool> {
        self.cache.contains(id)
    }

    fn claim_request(&self, request: ObserveRequest<C>) -> GuardResult<Claim> {
        let result = self.cache.observe_with(request);
        if let Some((metrics, domain)) = &self.metrics {
            metrics.record_observation(domain, &result);
        }
        Ok(if result?.is_accepted() {
            Claim::Granted
        } else {
            Claim::AlreadyClaimed
        })
    }
}
