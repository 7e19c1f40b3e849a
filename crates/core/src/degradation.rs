//! Explicit success/degraded results for optional pipeline stages.
//!
//! An optional stage never returns an error to the caller. It returns either its
//! output or the output of the previous stage together with a [`DegradationEvent`]
//! that the orchestrator collects into the response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage that can degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Semantic retrieval (embedding provider or vector index).
    VectorSearch,
    /// BM25 retrieval.
    LexicalSearch,
    /// Rule-based business scoring.
    BusinessScoring,
    /// Learned reranking.
    Reranking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::VectorSearch => "vector_search",
            Stage::LexicalSearch => "lexical_search",
            Stage::BusinessScoring => "business_scoring",
            Stage::Reranking => "reranking",
        };
        f.write_str(name)
    }
}

/// A stage fell back to a lower-quality result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub stage: Stage,
    /// What went wrong.
    pub reason: String,
    /// What was used instead.
    pub fallback: String,
}

impl DegradationEvent {
    /// Creates the event and logs it at `warn`.
    pub fn new(stage: Stage, reason: impl Into<String>, fallback: impl Into<String>) -> Self {
        let event = Self {
            stage,
            reason: reason.into(),
            fallback: fallback.into(),
        };
        tracing::warn!(
            stage = %event.stage,
            fallback = %event.fallback,
            "Stage degraded: {}",
            event.reason
        );
        event
    }
}

/// Output of an optional stage.
#[derive(Debug, Clone)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { fallback: T, event: DegradationEvent },
}

impl<T> StageOutcome<T> {
    /// Unwraps the value and pushes any degradation event onto `events`.
    pub fn collect_into(self, events: &mut Vec<DegradationEvent>) -> T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, event } => {
                events.push(event);
                fallback
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Completed(value) => StageOutcome::Completed(f(value)),
            StageOutcome::Degraded { fallback, event } => StageOutcome::Degraded {
                fallback: f(fallback),
                event,
            },
        }
    }
}
