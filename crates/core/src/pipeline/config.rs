//! Runtime pipeline configuration and named presets.

use crate::error::ConfigError;
use crate::scoring::BusinessWeights;
use crate::search::{FusionConfig, SearchMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Named stage combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Hybrid retrieval, business scoring, and ML reranking.
    #[default]
    Full,
    /// Hybrid retrieval and business scoring.
    Business,
    /// Hybrid retrieval only.
    Relevance,
    /// BM25 only. No vector index is loaded.
    Lexical,
    /// Vector retrieval only.
    Semantic,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Full,
        Preset::Business,
        Preset::Relevance,
        Preset::Lexical,
        Preset::Semantic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Full => "full",
            Preset::Business => "business",
            Preset::Relevance => "relevance",
            Preset::Lexical => "lexical",
            Preset::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

/// Stage toggles, fusion settings, and business weights.
///
/// Missing JSON fields take the `full` preset values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fusion: FusionConfig,
    pub business_weights: BusinessWeights,
    /// Use the BM25 index when it is available.
    pub enable_lexical: bool,
    /// Use the vector index when it is available.
    pub enable_semantic: bool,
    pub enable_business_scoring: bool,
    pub enable_reranking: bool,
    /// Mode used when a request does not name one.
    pub default_mode: SearchMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::preset(Preset::Full)
    }
}

impl PipelineConfig {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            fusion: FusionConfig::default(),
            business_weights: BusinessWeights::default(),
            enable_lexical: true,
            enable_semantic: true,
            enable_business_scoring: true,
            enable_reranking: true,
            default_mode: SearchMode::Auto,
        };
        match preset {
            Preset::Full => base,
            Preset::Business => Self {
                enable_reranking: false,
                default_mode: SearchMode::Hybrid,
                ..base
            },
            Preset::Relevance => Self {
                enable_business_scoring: false,
                enable_reranking: false,
                default_mode: SearchMode::Hybrid,
                ..base
            },
            Preset::Lexical => Self {
                enable_semantic: false,
                enable_business_scoring: false,
                enable_reranking: false,
                default_mode: SearchMode::Lexical,
                ..base
            },
            Preset::Semantic => Self {
                enable_lexical: false,
                enable_business_scoring: false,
                enable_reranking: false,
                default_mode: SearchMode::Semantic,
                ..base
            },
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::InvalidParameter {
            name: "pipeline_config",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidParameter {
            name: "pipeline_config",
            reason: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = self.fusion.semantic_weight;
        if !w.is_finite() || !(0.0..=1.0).contains(&w) {
            return Err(ConfigError::InvalidParameter {
                name: "semantic_weight",
                reason: format!("must be in [0, 1], got {w}"),
            });
        }
        if !self.enable_lexical && !self.enable_semantic {
            return Err(ConfigError::NoRetriever);
        }
        self.business_weights.validate()
    }
}
