//! Search primitives: candidate types, hybrid fusion, structured filters, and the
//! fusion retriever that runs lexical, semantic, or hybrid retrieval per query.

/// Post-retrieval structured filters.
pub mod filter;
/// Score normalization and hybrid fusion.
pub mod hybrid;
/// Mode selection and retrieval with degradation.
pub mod retriever;
/// Candidate, match type, and search mode.
pub mod types;

pub use filter::SearchFilters;
pub use hybrid::{fuse_scores, hybrid_fusion, min_max_normalize, raw_fused_score, FusionConfig};
pub use retriever::{auto_mode, FusionRetriever, Retrieval, SemanticSource};
pub use types::{Candidate, MatchType, SearchMode};
