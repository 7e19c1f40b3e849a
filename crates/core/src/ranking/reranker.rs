//! Inference-time reranking with a trained LambdaMART model.
//!
//! The reranker fails open: without a model, or when a candidate cannot be
//! featurized, candidates pass through unchanged and the stage reports a
//! degradation instead of an error.

use crate::degradation::{DegradationEvent, Stage, StageOutcome};
use crate::error::ArtifactError;
use crate::product::Catalog;
use crate::ranking::features::{ResultSnapshot, StandardScaler};
use crate::ranking::lambdamart::LambdaMart;
use crate::ranking::trainer::TrainedRanker;
use crate::search::types::{assign_positions, Candidate};
use crate::storage::persistence::load_artifact;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
struct LoadedModel {
    model: LambdaMart,
    scaler: StandardScaler,
}

/// LambdaMART reranker. Cheap to clone; the model is shared read-only.
#[derive(Debug, Clone, Default)]
pub struct MlReranker {
    inner: Option<Arc<LoadedModel>>,
}

impl MlReranker {
    /// A reranker with no model; `rerank` passes candidates through.
    pub fn untrained() -> Self {
        Self::default()
    }

    pub fn new(model: LambdaMart, scaler: StandardScaler) -> Self {
        Self {
            inner: Some(Arc::new(LoadedModel { model, scaler })),
        }
    }

    /// Loads the model and scaler artifacts. Any load failure leaves the reranker untrained.
    pub fn from_artifacts(model_path: &Path, scaler_path: &Path) -> Self {
        match Self::try_from_artifacts(model_path, scaler_path) {
            Ok(reranker) => reranker,
            Err(e) => {
                warn!(error = %e, "Ranker artifacts unavailable, reranking disabled");
                Self::untrained()
            }
        }
    }

    /// Loads the model and scaler artifacts, reporting the first failure.
    pub fn try_from_artifacts(model_path: &Path, scaler_path: &Path) -> Result<Self, ArtifactError> {
        let model: LambdaMart = load_artifact(model_path)?;
        let scaler: StandardScaler = load_artifact(scaler_path)?;
        info!(trees = model.num_trees(), "Ranker loaded");
        Ok(Self::new(model, scaler))
    }

    pub fn is_trained(&self) -> bool {
        self.inner.is_some()
    }

    /// Scores candidates with the model and sorts them by model score.
    ///
    /// Sets `ml_score` to the raw model output and `final_score` to its logistic
    /// transform, so `final_score` stays in \[0, 1\] and preserves model order.
    /// Features use each candidate's incoming `position`.
    pub fn rerank(&self, candidates: Vec<Candidate>, catalog: &Catalog) -> StageOutcome<Vec<Candidate>> {
        let Some(loaded) = &self.inner else {
            return StageOutcome::Degraded {
                fallback: candidates,
                event: DegradationEvent::new(Stage::Reranking, "no trained model loaded", "previous stage order"),
            };
        };
        if candidates.is_empty() {
            return StageOutcome::Completed(candidates);
        }

        let mut scores = Vec::with_capacity(candidates.len());
        for c in &candidates {
            let Some(product) = catalog.get(c.doc_id) else {
                let reason = format!("no catalog data for product '{}'", c.product_id);
                return degraded(candidates, reason);
            };
            let row = loaded
                .scaler
                .transform(&ResultSnapshot::from_candidate(c, product).features());
            let score = loaded.model.predict(&row);
            if !score.is_finite() {
                let reason = format!("non-finite model score for '{}'", c.product_id);
                return degraded(candidates, reason);
            }
            scores.push(score);
        }

        let mut reranked = candidates;
        for (c, score) in reranked.iter_mut().zip(scores) {
            c.ml_score = Some(score);
            c.final_score = logistic(score);
        }
        reranked.sort_by(|a, b| {
            let (sa, sb) = (a.ml_score.unwrap_or(f32::MIN), b.ml_score.unwrap_or(f32::MIN));
            sb.total_cmp(&sa).then(a.doc_id.cmp(&b.doc_id))
        });
        assign_positions(&mut reranked);
        StageOutcome::Completed(reranked)
    }
}

impl From<TrainedRanker> for MlReranker {
    fn from(trained: TrainedRanker) -> Self {
        Self::new(trained.model, trained.scaler)
    }
}

fn degraded(candidates: Vec<Candidate>, reason: String) -> StageOutcome<Vec<Candidate>> {
    StageOutcome::Degraded {
        fallback: candidates,
        event: DegradationEvent::new(Stage::Reranking, reason, "previous stage order"),
    }
}

fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
