use std::{fs, path::Path};

use keel_package::{ArtifactIndex, PackageArtifact};
use keel_utils::fs::{safe_remove, write_atomic};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, Result};

/// The `repository.meta.json` document: every artifact the repository
/// publishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default)]
    pub index: ArtifactIndex,
}

impl RepositoryMetadata {
    pub fn new(index: ArtifactIndex) -> Self {
        Self {
            index,
        }
    }

    /// Reads a metadata document, deleting the file afterwards when
    /// `remove_file` is set.
    pub fn read_file<P: AsRef<Path>>(path: P, remove_file: bool) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read(path)
            .with_context(|| format!("reading repository metadata {}", path.display()))?;
        let metadata = serde_json::from_slice(&content)?;
        if remove_file {
            safe_remove(path)?;
        }
        Ok(metadata)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)?;
        Ok(())
    }

    pub fn to_artifact_index(&self) -> ArtifactIndex {
        self.index.clone()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &PackageArtifact> {
        self.index.iter()
    }
}

#[cfg(test)]
mod tests {
    use keel_package::{Compression, Package};

    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repository.meta.json");

        let mut artifact =
            PackageArtifact::new("curl-net-8.1.tar.gz").with_compression(Compression::Gzip);
        artifact.package = Package::new("curl", "net", "8.1");
        artifact.files = vec!["usr/bin/curl".into()];
        artifact
            .checksums
            .insert("sha256".into(), "abc".into());
        let metadata = RepositoryMetadata::new(vec![artifact].into_iter().collect());

        metadata.write_file(&path).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["index"].is_array());
        assert_eq!(raw["index"][0]["compressiontype"], "gzip");

        let read = RepositoryMetadata::read_file(&path, false).unwrap();
        assert_eq!(read, metadata);
        assert!(path.exists());

        let index = RepositoryMetadata::read_file(&path, true)
            .unwrap()
            .to_artifact_index();
        assert_eq!(index.len(), 1);
        assert!(!path.exists());
    }
}
