//! Learned reranking: feature extraction, LambdaMART training, and inference.
//!
//! Training runs offline over logged searches joined with click-derived relevance
//! labels and produces two artifacts, the model and the feature scaler. At query
//! time [`MlReranker`] loads both and reorders candidates, or passes them through
//! when no model is available.

/// Feature rows and the standard scaler.
pub mod features;
/// Regression trees and LambdaRank gradients.
pub mod lambdamart;
/// DCG and nDCG.
pub mod metrics;
/// Query-time reranker.
pub mod reranker;
/// Training set construction, query split, and boosting loop.
pub mod trainer;

pub use features::{FeatureRow, ResultSnapshot, StandardScaler, FEATURE_NAMES, NUM_FEATURES};
pub use lambdamart::LambdaMart;
pub use metrics::{dcg_at_k, ndcg_at_k};
pub use reranker::MlReranker;
pub use trainer::{
    synthesize_training_data, train_ranker, RelevanceLabels, SearchLog, TrainedRanker, TrainerConfig,
    TrainingData, TrainingReport, TrainingSet,
};
