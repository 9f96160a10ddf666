//! External tie-break capability consulted for low-confidence multi-matches.

use crate::distiller::CandidateSummary;
use crate::model::AttributeSet;
use async_trait::async_trait;

/// Best-effort decision maker (typically an LLM) that picks among candidates.
///
/// Returns the position of the chosen candidate within `candidates`, or
/// `None` to defer to the rule-based winner. Out-of-range answers are ignored.
#[async_trait]
pub trait Arbiter: Send + Sync {
    async fn arbitrate(&self, candidates: &[CandidateSummary], intent: &AttributeSet)
        -> Option<usize>;

    fn name(&self) -> &str {
        "arbiter"
    }
}

/// Arbiter that never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopArbiter;

#[async_trait]
impl Arbiter for NoopArbiter {
    async fn arbitrate(
        &self,
        _candidates: &[CandidateSummary],
        _intent: &AttributeSet,
    ) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "noop"
    }
}
