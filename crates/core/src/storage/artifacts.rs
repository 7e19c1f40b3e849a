//! File names of the persisted artifacts inside an artifact directory.

use std::path::{Path, PathBuf};

/// Locations of the four artifacts (plus the catalog snapshot) in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validated catalog in JSON lines, written alongside the indices.
    pub fn catalog(&self) -> PathBuf {
        self.dir.join("catalog.jsonl")
    }

    pub fn lexical_index(&self) -> PathBuf {
        self.dir.join("lexical.idx")
    }

    pub fn vector_index(&self) -> PathBuf {
        self.dir.join("vectors.idx")
    }

    pub fn ranker_model(&self) -> PathBuf {
        self.dir.join("ranker.model")
    }

    pub fn feature_scaler(&self) -> PathBuf {
        self.dir.join("scaler.bin")
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ARTIFACT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_directory() {
        let paths = ArtifactPaths::new("/tmp/shop");
        for p in [
            paths.catalog(),
            paths.lexical_index(),
            paths.vector_index(),
            paths.ranker_model(),
            paths.feature_scaler(),
        ] {
            assert_eq!(p.parent(), Some(Path::new("/tmp/shop")));
        }
    }
}
