//! Storage layer: checksummed artifact files and the artifact directory layout.
//!
//! Each pipeline component persists itself as an independent artifact
//! (atomic temp-file + rename, CRC32 footer). [`ArtifactPaths`] names the files
//! inside an artifact directory so builders and loaders agree on the layout.

/// Artifact directory layout.
pub mod artifacts;
/// Disk persistence: artifact save/load with atomic writes and CRC32 verification.
pub mod persistence;

pub use artifacts::ArtifactPaths;
pub use persistence::{load_artifact, save_artifact, Artifact, ArtifactKind};
