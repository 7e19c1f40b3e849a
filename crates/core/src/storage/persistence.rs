//! Disk persistence for index and model artifacts using bincode serialization.
//!
//! Every artifact is written as `[bincode payload][4-byte magic][u32 CRC32 BE]`.
//! The magic identifies the artifact kind so a file of the wrong kind is rejected
//! before decoding. Writes use atomic temp-file + rename to prevent a torn artifact
//! from ever being visible to a loading process.

use crate::error::ArtifactError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// The four independently loadable artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// BM25 statistics ([`LexicalIndex`](crate::bm25::LexicalIndex)).
    LexicalIndex,
    /// Vector index ([`VectorIndex`](crate::vector::VectorIndex)).
    VectorIndex,
    /// Trained LambdaMART ensemble.
    RankerModel,
    /// Feature standardization statistics.
    FeatureScaler,
}

impl ArtifactKind {
    /// Footer magic written before the checksum.
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            ArtifactKind::LexicalIndex => b"LEX1",
            ArtifactKind::VectorIndex => b"VEC1",
            ArtifactKind::RankerModel => b"RNK1",
            ArtifactKind::FeatureScaler => b"SCL1",
        }
    }

    /// Human-readable kind name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::LexicalIndex => "lexical index",
            ArtifactKind::VectorIndex => "vector index",
            ArtifactKind::RankerModel => "ranker model",
            ArtifactKind::FeatureScaler => "feature scaler",
        }
    }
}

/// A value that can be persisted as a checksummed artifact.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Kind tag, determines the footer magic.
    const KIND: ArtifactKind;

    /// Checks internal consistency after decoding.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Save an artifact with atomic write.
/// Appends a footer: [magic][u32 CRC32 BE].
pub fn save_artifact<T: Artifact>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let bytes = bincode::serialize(value).map_err(|e| ArtifactError::Serialization(e.to_string()))?;

    // Compute CRC32 over the bincode payload
    let crc = crc32fast::hash(&bytes);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(T::KIND.magic());
    output.extend_from_slice(&crc.to_be_bytes());

    // Atomic write: write to temp, then rename
    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        "Saved {} to {:?} ({} bytes, CRC32={:#010x})",
        T::KIND.name(),
        path,
        bytes.len(),
        crc
    );
    Ok(())
}

/// Load an artifact, verifying the kind magic and CRC32 before decoding.
pub fn load_artifact<T: Artifact>(path: &Path) -> Result<T, ArtifactError> {
    let path_str = path.display().to_string();
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound(path_str));
        }
        Err(e) => return Err(e.into()),
    };

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != T::KIND.magic() {
        return Err(ArtifactError::WrongKind {
            path: path_str,
            expected: T::KIND.name(),
        });
    }

    let payload = &raw[..raw.len() - 8];
    let stored = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed = crc32fast::hash(payload);
    if computed != stored {
        return Err(ArtifactError::Checksum {
            path: path_str,
            stored,
            computed,
        });
    }
    tracing::debug!("Artifact CRC32 verified: {:#010x}", stored);

    let value: T =
        bincode::deserialize(payload).map_err(|e| ArtifactError::Serialization(e.to_string()))?;
    value
        .validate()
        .map_err(|reason| ArtifactError::Invalid {
            path: path_str.clone(),
            reason,
        })?;

    tracing::info!("Loaded {} from {}", T::KIND.name(), path_str);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        values: Vec<f32>,
    }

    impl Artifact for Blob {
        const KIND: ArtifactKind = ArtifactKind::FeatureScaler;

        fn validate(&self) -> Result<(), String> {
            if self.values.iter().all(|v| v.is_finite()) {
                Ok(())
            } else {
                Err("non-finite value".to_string())
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Other(u32);

    impl Artifact for Other {
        const KIND: ArtifactKind = ArtifactKind::RankerModel;
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scaler.bin");
        let blob = Blob {
            values: vec![1.0, 2.5, -3.0],
        };
        save_artifact(&blob, &path).unwrap();
        let loaded: Blob = load_artifact(&path).unwrap();
        assert_eq!(loaded, blob);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_artifact::<Blob>(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        save_artifact(&Other(7), &path).unwrap();
        let err = load_artifact::<Blob>(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::WrongKind { .. }));
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        save_artifact(&Blob { values: vec![0.5; 16] }, &path).unwrap();
        let mut raw = fs::read(&path).unwrap();
        raw[3] ^= 0xff;
        fs::write(&path, &raw).unwrap();
        let err = load_artifact::<Blob>(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Checksum { .. }), "got {err:?}");
    }

    #[test]
    fn test_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        save_artifact(&Blob { values: vec![f32::NAN] }, &path).unwrap();
        let err = load_artifact::<Blob>(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }
}
