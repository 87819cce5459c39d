//! Package artifacts: compressed tarballs with their checksums, and the
//! index of artifacts published by a repository.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read},
    path::{Path, PathBuf},
};

use flate2::{read::GzDecoder, write::GzEncoder};
use keel_utils::{
    fs::{ensure_dir_exists, safe_remove},
    hash::{calculate_with, DEFAULT_ALGORITHMS},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    error::{ErrorContext, PackageError, Result},
    package::Package,
};

/// Suffix of the sidecar file describing a built artifact.
pub const METADATA_SUFFIX: &str = ".metadata.json";

/// Checksums keyed by algorithm name.
pub type Checksums = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    #[serde(alias = "gz")]
    Gzip,
    #[serde(alias = "zst")]
    Zstd,
}

impl Compression {
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gz"),
            Compression::Zstd => Some("zst"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageArtifact {
    pub path: PathBuf,

    #[serde(default, rename = "compressiontype")]
    pub compression: Compression,

    #[serde(default)]
    pub checksums: Checksums,

    #[serde(default)]
    pub package: Package,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl PackageArtifact {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Archives `src` (a directory or a single file) into a tarball at the
    /// artifact path, then applies the artifact's compression.
    ///
    /// On success `path` points at the final file, including the compression
    /// extension.
    pub fn compress<P: AsRef<Path>>(&mut self, src: P) -> Result<()> {
        let src = src.as_ref();
        if let Some(parent) = self.path.parent() {
            ensure_dir_exists(parent)?;
        }

        let tarball = File::create(&self.path)
            .with_context(|| format!("creating archive {}", self.path.display()))?;
        let mut builder = tar::Builder::new(BufWriter::new(tarball));
        builder.mode(tar::HeaderMode::Deterministic);

        if src.is_dir() {
            builder
                .append_dir_all(".", src)
                .with_context(|| format!("archiving {}", src.display()))?;
        } else {
            let name = src.file_name().unwrap_or(src.as_os_str());
            builder
                .append_path_with_name(src, name)
                .with_context(|| format!("archiving {}", src.display()))?;
        }
        builder
            .into_inner()
            .and_then(|mut writer| io::Write::flush(&mut writer))
            .with_context(|| format!("finishing archive {}", self.path.display()))?;

        let Some(extension) = self.compression.extension() else {
            trace!(path = %self.path.display(), "archive left uncompressed");
            return Ok(());
        };

        let tar_path = self.path.clone();
        let mut compressed = tar_path.clone().into_os_string();
        compressed.push(".");
        compressed.push(extension);
        let compressed = PathBuf::from(compressed);

        let mut input = BufReader::new(
            File::open(&tar_path)
                .with_context(|| format!("opening archive {}", tar_path.display()))?,
        );
        let output = File::create(&compressed)
            .with_context(|| format!("creating {}", compressed.display()))?;

        match self.compression {
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(output, flate2::Compression::default());
                io::copy(&mut input, &mut encoder)
                    .and_then(|_| encoder.finish().map(|_| ()))
                    .with_context(|| format!("compressing {}", compressed.display()))?;
            }
            Compression::Zstd => {
                zstd::stream::copy_encode(&mut input, output, 0)
                    .with_context(|| format!("compressing {}", compressed.display()))?;
            }
            Compression::None => {}
        }

        safe_remove(&tar_path)?;
        debug!(from = %tar_path.display(), to = %compressed.display(), "compressed archive");
        self.path = compressed;
        Ok(())
    }

    /// Computes every default checksum of the artifact file.
    pub fn hash(&mut self) -> Result<()> {
        let mut checksums = Checksums::new();
        for algorithm in DEFAULT_ALGORITHMS {
            checksums.insert(algorithm.to_string(), calculate_with(algorithm, &self.path)?);
        }
        self.checksums = checksums;
        Ok(())
    }

    /// Checks the file at `path` against the recorded checksums.
    ///
    /// An empty checksum set never verifies.
    pub fn verify_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if self.checksums.is_empty() {
            return Err(PackageError::MissingChecksums(path.to_path_buf()));
        }

        for (algorithm, expected) in &self.checksums {
            let actual = calculate_with(algorithm, path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(PackageError::ChecksumMismatch {
                    path: path.to_path_buf(),
                    algorithm: algorithm.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<()> {
        self.verify_file(&self.path)
    }

    /// Extracts the artifact into `dst`.
    pub fn unpack<P: AsRef<Path>>(&self, dst: P) -> Result<()> {
        let dst = dst.as_ref();
        ensure_dir_exists(dst)?;

        let file = BufReader::new(
            File::open(&self.path)
                .with_context(|| format!("opening archive {}", self.path.display()))?,
        );
        let reader: Box<dyn Read> = match self.compression {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::Zstd => {
                Box::new(
                    zstd::stream::Decoder::new(file)
                        .with_context(|| format!("decoding {}", self.path.display()))?,
                )
            }
        };

        let mut archive = tar::Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive
            .unpack(dst)
            .with_context(|| format!("unpacking {} into {}", self.path.display(), dst.display()))?;
        debug!(path = %self.path.display(), dst = %dst.display(), "unpacked archive");
        Ok(())
    }

    /// Drops the directory part of `path`, leaving only the file name.
    pub fn clean_path(&mut self) {
        self.path = PathBuf::from(self.file_name());
    }

    /// Reads an artifact sidecar. The artifact path is resolved relative to
    /// the sidecar's directory.
    pub fn from_sidecar<P: AsRef<Path>>(sidecar: P) -> Result<Self> {
        let sidecar = sidecar.as_ref();
        let content = fs::read(sidecar)
            .with_context(|| format!("reading artifact metadata {}", sidecar.display()))?;
        let mut artifact: PackageArtifact = serde_json::from_slice(&content)?;

        if let Some(dir) = sidecar.parent() {
            artifact.path = dir.join(artifact.file_name());
        }
        Ok(artifact)
    }

    /// Writes the sidecar for this artifact next to it and returns its path.
    pub fn write_sidecar(&self) -> Result<PathBuf> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let sidecar = dir.join(format!("{}{METADATA_SUFFIX}", self.package.fingerprint()));
        let mut published = self.clone();
        published.clean_path();
        fs::write(&sidecar, serde_json::to_vec_pretty(&published)?)
            .with_context(|| format!("writing artifact metadata {}", sidecar.display()))?;
        Ok(sidecar)
    }
}

/// Ordered list of artifacts published by a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactIndex(Vec<PackageArtifact>);

impl ArtifactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: PackageArtifact) {
        self.0.push(artifact);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageArtifact> {
        self.0.iter()
    }

    /// Copy of the index with every artifact path reduced to its file name.
    pub fn clean_path(&self) -> Self {
        self.0
            .iter()
            .cloned()
            .map(|mut artifact| {
                artifact.clean_path();
                artifact
            })
            .collect()
    }

    /// First artifact built from exactly this package.
    pub fn find(&self, package: &Package) -> Option<&PackageArtifact> {
        self.0.iter().find(|a| a.package.matches(package))
    }
}

impl FromIterator<PackageArtifact> for ArtifactIndex {
    fn from_iter<I: IntoIterator<Item = PackageArtifact>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ArtifactIndex {
    type Item = PackageArtifact;
    type IntoIter = std::vec::IntoIter<PackageArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArtifactIndex {
    type Item = &'a PackageArtifact;
    type IntoIter = std::slice::Iter<'a, PackageArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
