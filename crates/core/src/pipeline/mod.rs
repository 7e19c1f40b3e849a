//! Pipeline composition: configuration presets, the orchestrator, artifact
//! loading, and the hot-swappable search service.

/// Offline artifact build and startup loading.
pub mod builder;
/// `PipelineConfig` and named presets.
pub mod config;
/// The per-query orchestrator.
pub mod orchestrator;
/// Atomic pipeline replacement.
pub mod service;

pub use builder::{build_artifacts, load_pipeline, BuildSummary};
pub use config::{PipelineConfig, Preset};
pub use orchestrator::{Pipeline, SearchHit, SearchRequest, SearchResponse, SortOrder};
pub use service::SearchService;
