//! The repository descriptor and its published spec document.

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use keel_config::{environment::Environment, repository::Repository};
use keel_dl::Transport;
use keel_events::RepositorySnapshot;
use keel_package::{
    ArtifactIndex, Checksums, Compression, InMemoryDatabase, Package, PackageArtifact,
    PackageError, Recipe, RecipeKind,
};
use keel_utils::{fs::write_atomic, path::is_plain_file_name};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ErrorContext, RegistryError, Result, StepContext},
    metadata::RepositoryMetadata,
};

/// Name of the spec document at the root of every published repository.
pub const REPOSITORY_SPEC_FILE: &str = "repository.json";

/// Name of the metadata document inside the `meta` bundle.
pub const REPOSITORY_METADATA_FILE: &str = "repository.meta.json";

pub const TREE_KEY: &str = "tree";
pub const COMPILER_TREE_KEY: &str = "compilertree";
pub const META_KEY: &str = "meta";

pub const TREE_TARBALL: &str = "tree.tar";
pub const COMPILER_TREE_TARBALL: &str = "compilertree.tar";
pub const META_TARBALL: &str = "repository.meta.json.tar";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryType {
    Disk,
    Http,
    Registry,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Disk => "disk",
            RepositoryType::Http => "http",
            RepositoryType::Registry => "registry",
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            RepositoryType::Disk => Transport::Local,
            RepositoryType::Http => Transport::Http,
            RepositoryType::Registry => Transport::Oci,
        }
    }
}

impl FromStr for RepositoryType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(RepositoryType::Disk),
            "http" => Ok(RepositoryType::Http),
            "registry" | "docker" => Ok(RepositoryType::Registry),
            _ => Err(RegistryError::UnknownRepositoryType(s.to_string())),
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bundle published alongside the spec document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryFile {
    #[serde(rename = "filename")]
    pub file_name: String,

    #[serde(default, rename = "compressiontype")]
    pub compression: Compression,

    #[serde(default)]
    pub checksums: Checksums,
}

impl RepositoryFile {
    pub fn new(file_name: &str, compression: Compression) -> Self {
        Self {
            file_name: file_name.to_string(),
            compression,
            checksums: Checksums::new(),
        }
    }

    /// Defaults for the runtime tree bundle.
    pub fn default_tree() -> Self {
        Self::new(TREE_TARBALL, Compression::Gzip)
    }

    /// Defaults for the compiler tree bundle.
    pub fn default_compiler_tree() -> Self {
        Self::new(COMPILER_TREE_TARBALL, Compression::Gzip)
    }

    /// Defaults for the metadata bundle.
    pub fn default_meta() -> Self {
        Self::new(META_TARBALL, Compression::None)
    }

    pub fn default_for(key: &str) -> Option<Self> {
        match key {
            TREE_KEY => Some(Self::default_tree()),
            COMPILER_TREE_KEY => Some(Self::default_compiler_tree()),
            META_KEY => Some(Self::default_meta()),
            _ => None,
        }
    }

    /// The downloaded file as an artifact carrying the expected checksums.
    pub fn artifact<P: Into<PathBuf>>(&self, path: P) -> PackageArtifact {
        let mut artifact = PackageArtifact::new(path).with_compression(self.compression);
        artifact.checksums = self.checksums.clone();
        artifact
    }
}

/// Wire form of a repository descriptor (`repository.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedRepository {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, rename = "type")]
    pub repo_type: String,

    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub last_update: String,

    #[serde(default, rename = "treepath", skip_serializing_if = "String::is_empty")]
    pub tree_path: String,

    #[serde(default, rename = "metapath", skip_serializing_if = "String::is_empty")]
    pub meta_path: String,

    #[serde(default, rename = "repo_files")]
    pub repository_files: BTreeMap<String, RepositoryFile>,

    #[serde(default)]
    pub verify: bool,
}

/// A repository descriptor, either authored locally for publishing or
/// reconstructed from a downloaded spec document.
#[derive(Debug, Clone)]
pub struct SystemRepository {
    pub name: String,
    pub description: String,
    /// Mirrors, tried in order.
    pub urls: Vec<String>,
    pub repo_type: RepositoryType,
    /// Lower value wins.
    pub priority: i32,
    pub revision: u64,
    /// Unix seconds of the last publish.
    pub last_update: String,
    pub verify: bool,
    pub authentication: HashMap<String, String>,
    /// Whether sync persists the repository in the local cache.
    pub cached: bool,
    pub tree_path: Option<PathBuf>,
    pub meta_path: Option<PathBuf>,
    pub repository_files: BTreeMap<String, RepositoryFile>,
    pub index: ArtifactIndex,
    /// Runtime package tree.
    pub tree: Recipe,
    /// Compiler package tree.
    pub build_tree: Recipe,
}

impl SystemRepository {
    pub fn new(
        name: &str,
        description: &str,
        repo_type: RepositoryType,
        urls: Vec<String>,
        priority: i32,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            urls,
            repo_type,
            priority,
            revision: 0,
            last_update: String::new(),
            verify: false,
            authentication: HashMap::new(),
            cached: true,
            tree_path: None,
            meta_path: None,
            repository_files: BTreeMap::new(),
            index: ArtifactIndex::new(),
            tree: Recipe::installer(Arc::new(InMemoryDatabase::new())),
            build_tree: Recipe::compiler(Arc::new(InMemoryDatabase::new())),
        }
    }

    /// Descriptor for a configured repository, before its first sync.
    pub fn from_config(repo: &Repository) -> Result<Self> {
        let mut system = Self::new(
            &repo.name,
            repo.description.as_deref().unwrap_or_default(),
            repo.repo_type.parse()?,
            repo.urls.clone(),
            repo.priority(),
        );
        system.verify = repo.verify();
        system.cached = repo.is_cached();
        system.authentication = repo.authentication.clone();
        Ok(system)
    }

    /// Parses a spec document. Only `tree` and `meta` files are mandatory.
    pub fn from_spec_document(data: &[u8]) -> Result<Self> {
        Self::parse_spec_document(data, None)
    }

    /// Parses a spec document fetched from a mirror of a repository of type
    /// `local_type`. The remote `type` is advisory: a missing or unknown one
    /// falls back to `local_type`.
    pub fn from_remote_spec_document(data: &[u8], local_type: RepositoryType) -> Result<Self> {
        Self::parse_spec_document(data, Some(local_type))
    }

    fn parse_spec_document(data: &[u8], fallback_type: Option<RepositoryType>) -> Result<Self> {
        let doc: SerializedRepository = serde_json::from_slice(data)?;

        for key in [TREE_KEY, META_KEY] {
            if !doc.repository_files.contains_key(key) {
                return Err(RegistryError::MalformedDescriptor(format!(
                    "repository '{}' does not declare the '{key}' file",
                    doc.name
                )));
            }
        }
        for (key, file) in &doc.repository_files {
            if !is_plain_file_name(&file.file_name) {
                return Err(RegistryError::MalformedDescriptor(format!(
                    "repository '{}' declares '{}' for the '{key}' file, which is not a plain file name",
                    doc.name, file.file_name
                )));
            }
        }

        let repo_type = match (doc.repo_type.parse::<RepositoryType>(), fallback_type) {
            (Ok(repo_type), _) => repo_type,
            (Err(_), Some(local)) => {
                debug!(
                    repository = %doc.name,
                    remote_type = %doc.repo_type,
                    "ignoring remote repository type"
                );
                local
            }
            (Err(err), None) => return Err(err),
        };

        let mut repo = Self::new(
            &doc.name,
            &doc.description,
            repo_type,
            doc.urls,
            doc.priority,
        );
        repo.revision = doc.revision;
        repo.last_update = doc.last_update;
        repo.verify = doc.verify;
        repo.cached = false;
        repo.repository_files = doc.repository_files;
        if !doc.tree_path.is_empty() {
            repo.tree_path = Some(PathBuf::from(doc.tree_path));
        }
        if !doc.meta_path.is_empty() {
            repo.meta_path = Some(PathBuf::from(doc.meta_path));
        }
        Ok(repo)
    }

    pub fn read_spec_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_spec_document(&data).step(|| format!("loading {}", path.display()))
    }

    pub fn add_url(&mut self, url: &str) {
        self.urls.push(url.to_string());
    }

    pub fn increment_revision(&mut self) {
        self.revision += 1;
    }

    pub fn repository_file(&self, key: &str) -> Result<&RepositoryFile> {
        self.repository_files.get(key).ok_or_else(|| {
            RegistryError::MalformedDescriptor(format!(
                "repository '{}' has no '{key}' file",
                self.name
            ))
        })
    }

    pub fn set_repository_file(&mut self, key: &str, file: RepositoryFile) {
        self.repository_files.insert(key.to_string(), file);
    }

    /// Computes the next revision from the spec previously published at
    /// `spec_path`. A reset restarts the count so the next publish is 1.
    pub fn bump_revision<P: AsRef<Path>>(&mut self, spec_path: P, reset: bool) -> Result<()> {
        let spec_path = spec_path.as_ref();
        if reset {
            self.revision = 0;
        } else if spec_path.exists() {
            let previous = Self::read_spec_file(spec_path)?;
            self.revision = previous.revision;
        }
        self.increment_revision();
        debug!(repository = %self.name, revision = self.revision, "bumped revision");
        Ok(())
    }

    /// Archives `src` into `dst` as the bundle registered under `key`.
    ///
    /// The bundle keeps the compression of an already registered file for
    /// `key`, else the one of `defaults`; its name is always derived from
    /// `defaults` and rewritten to the compressed file's name.
    pub fn add_repository_file(
        &mut self,
        src: &Path,
        key: &str,
        dst: &Path,
        defaults: RepositoryFile,
    ) -> Result<PackageArtifact> {
        let compression = self
            .repository_files
            .get(key)
            .map(|file| file.compression)
            .unwrap_or(defaults.compression);

        let mut artifact =
            PackageArtifact::new(dst.join(&defaults.file_name)).with_compression(compression);
        artifact
            .compress(src)
            .step(|| format!("compressing the {key} bundle"))?;
        artifact
            .hash()
            .step(|| format!("hashing the {key} bundle"))?;

        self.set_repository_file(
            key,
            RepositoryFile {
                file_name: artifact.file_name(),
                compression,
                checksums: artifact.checksums.clone(),
            },
        );
        Ok(artifact)
    }

    /// Saves one of the package trees and adds it to `dst` as a bundle.
    pub fn add_tree(
        &mut self,
        env: &Environment,
        kind: RecipeKind,
        dst: &Path,
    ) -> Result<PackageArtifact> {
        let (recipe, key, defaults) = match kind {
            RecipeKind::Installer => (self.tree.clone(), TREE_KEY, RepositoryFile::default_tree()),
            RecipeKind::Compiler => {
                (
                    self.build_tree.clone(),
                    COMPILER_TREE_KEY,
                    RepositoryFile::default_compiler_tree(),
                )
            }
        };

        let archive = env.temp_dir("archive")?;
        recipe
            .save(archive.path())
            .step(|| format!("saving the {key} package tree"))?;
        self.add_repository_file(archive.path(), key, dst, defaults)
    }

    /// Writes the metadata document and adds it to `dst` as the `meta`
    /// bundle.
    pub fn add_metadata_file(&mut self, env: &Environment, dst: &Path) -> Result<PackageArtifact> {
        let (metadata, _) = self.serialize();
        let meta_dir = env.temp_dir("metadata")?;
        metadata.write_file(meta_dir.path().join(REPOSITORY_METADATA_FILE))?;
        self.add_repository_file(meta_dir.path(), META_KEY, dst, RepositoryFile::default_meta())
    }

    /// Writes the spec document describing the current state.
    pub fn write_spec_file<P: AsRef<Path>>(&self, spec_path: P) -> Result<()> {
        let (_, serialized) = self.serialize();
        write_atomic(spec_path, &serde_json::to_vec_pretty(&serialized)?)?;
        Ok(())
    }

    /// Adds the metadata bundle to `dst`, then writes the spec document.
    pub fn add_metadata<P: AsRef<Path>>(
        &mut self,
        env: &Environment,
        spec_path: P,
        dst: &Path,
    ) -> Result<PackageArtifact> {
        let artifact = self.add_metadata_file(env, dst)?;
        self.write_spec_file(spec_path)?;
        Ok(artifact)
    }

    /// Splits the descriptor into its two published documents. Artifact
    /// paths are reduced to file names.
    pub fn serialize(&self) -> (RepositoryMetadata, SerializedRepository) {
        let serialized = SerializedRepository {
            name: self.name.clone(),
            description: self.description.clone(),
            urls: self.urls.clone(),
            priority: self.priority,
            repo_type: self.repo_type.to_string(),
            revision: self.revision,
            last_update: self.last_update.clone(),
            tree_path: String::new(),
            meta_path: String::new(),
            repository_files: self.repository_files.clone(),
            verify: self.verify,
        };
        (RepositoryMetadata::new(self.index.clean_path()), serialized)
    }

    /// First artifact built from exactly `package`.
    pub fn search_artifact(&self, package: &Package) -> Option<&PackageArtifact> {
        self.index.find(package)
    }

    /// Packages whose artifacts install a file matching `pattern`.
    pub fn file_search(&self, pattern: &str) -> Result<Vec<Package>> {
        let re = Regex::new(pattern).map_err(|err| {
            PackageError::InvalidPattern {
                pattern: pattern.to_string(),
                source: err,
            }
        })?;

        Ok(self
            .index
            .iter()
            .filter(|artifact| artifact.files.iter().any(|f| re.is_match(f)))
            .map(|artifact| artifact.package.clone())
            .collect())
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            repo_type: self.repo_type.to_string(),
            urls: self.urls.clone(),
            priority: self.priority,
            revision: self.revision,
            last_update: self.last_update.clone(),
            files: self
                .repository_files
                .iter()
                .map(|(key, file)| (key.clone(), file.file_name.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(root: &Path) -> Environment {
        Environment::new(root.join("repos"), root.join("tmp"))
    }

    fn sample() -> SystemRepository {
        let repo = SystemRepository::new(
            "main",
            "Main repository",
            RepositoryType::Http,
            vec!["https://example.com/main".into()],
            10,
        );
        repo.tree
            .database()
            .create_package(Package::new("curl", "net", "8.1"))
            .unwrap();
        repo
    }

    #[test]
    fn test_repository_type() {
        assert_eq!(
            "docker".parse::<RepositoryType>().unwrap(),
            RepositoryType::Registry
        );
        assert_eq!("DISK".parse::<RepositoryType>().unwrap(), RepositoryType::Disk);
        assert_eq!(RepositoryType::Registry.to_string(), "registry");
        assert!(matches!(
            "ftp".parse::<RepositoryType>(),
            Err(RegistryError::UnknownRepositoryType(t)) if t == "ftp"
        ));
    }

    #[test]
    fn test_from_config() {
        let config: Repository = serde_json::from_value(serde_json::json!({
            "name": "extra",
            "type": "docker",
            "urls": ["quay.io/keel/extra"],
            "priority": 3,
            "verify": true,
            "authentication": {"token": "t"},
        }))
        .unwrap();

        let repo = SystemRepository::from_config(&config).unwrap();
        assert_eq!(repo.repo_type, RepositoryType::Registry);
        assert_eq!(repo.priority, 3);
        assert!(repo.verify);
        assert!(repo.cached);
        assert_eq!(repo.authentication["token"], "t");
    }

    #[test]
    fn test_spec_document_requires_tree_and_meta() {
        let doc = serde_json::json!({
            "name": "main",
            "type": "http",
            "revision": 3,
            "repo_files": {
                "tree": {"filename": "tree.tar.gz", "compressiontype": "gzip", "checksums": {}}
            }
        });
        let err = SystemRepository::from_spec_document(doc.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, RegistryError::MalformedDescriptor(msg) if msg.contains("'meta'")));
    }

    #[test]
    fn test_spec_document_unknown_type() {
        let doc = serde_json::json!({
            "name": "main",
            "type": "ftp",
            "repo_files": {
                "tree": {"filename": "tree.tar.gz"},
                "meta": {"filename": "repository.meta.json.tar"}
            }
        });
        assert!(matches!(
            SystemRepository::from_spec_document(doc.to_string().as_bytes()),
            Err(RegistryError::UnknownRepositoryType(_))
        ));
    }

    fn spec_with(files: serde_json::Value, repo_type: Option<&str>) -> Vec<u8> {
        let mut doc = serde_json::json!({
            "name": "main",
            "revision": 4,
            "last_update": "1700000000",
            "repo_files": files,
        });
        if let Some(repo_type) = repo_type {
            doc["type"] = repo_type.into();
        }
        doc.to_string().into_bytes()
    }

    fn plain_files() -> serde_json::Value {
        serde_json::json!({
            "tree": {"filename": "tree.tar.gz"},
            "meta": {"filename": "repository.meta.json.tar"}
        })
    }

    #[test]
    fn test_spec_document_rejects_escaping_file_names() {
        for name in ["../ESCAPED.tar.gz", "/etc/cron.d/keel", "bundles/tree.tar.gz", ".."] {
            let files = serde_json::json!({
                "tree": {"filename": name},
                "meta": {"filename": "repository.meta.json.tar"}
            });
            let data = spec_with(files, Some("http"));
            assert!(matches!(
                SystemRepository::from_spec_document(&data),
                Err(RegistryError::MalformedDescriptor(msg)) if msg.contains(name)
            ));
            assert!(matches!(
                SystemRepository::from_remote_spec_document(&data, RepositoryType::Http),
                Err(RegistryError::MalformedDescriptor(_))
            ));
        }
    }

    #[test]
    fn test_remote_spec_type_is_advisory() {
        let missing = spec_with(plain_files(), None);
        let repo =
            SystemRepository::from_remote_spec_document(&missing, RepositoryType::Registry).unwrap();
        assert_eq!(repo.repo_type, RepositoryType::Registry);
        assert_eq!(repo.revision, 4);

        let unknown = spec_with(plain_files(), Some("s3"));
        let repo = SystemRepository::from_remote_spec_document(&unknown, RepositoryType::Disk).unwrap();
        assert_eq!(repo.repo_type, RepositoryType::Disk);

        let known = spec_with(plain_files(), Some("http"));
        let repo = SystemRepository::from_remote_spec_document(&known, RepositoryType::Disk).unwrap();
        assert_eq!(repo.repo_type, RepositoryType::Http);

        let nameless = serde_json::json!({"type": "disk", "repo_files": plain_files()});
        let repo = SystemRepository::from_spec_document(nameless.to_string().as_bytes()).unwrap();
        assert_eq!(repo.name, "");

        assert!(matches!(
            SystemRepository::from_spec_document(&missing),
            Err(RegistryError::UnknownRepositoryType(t)) if t.is_empty()
        ));
    }

    #[test]
    fn test_bump_revision() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join(REPOSITORY_SPEC_FILE);
        let mut repo = sample();

        repo.bump_revision(&spec, false).unwrap();
        assert_eq!(repo.revision, 1);

        repo.revision = 7;
        repo.set_repository_file(TREE_KEY, RepositoryFile::default_tree());
        repo.set_repository_file(META_KEY, RepositoryFile::default_meta());
        repo.write_spec_file(&spec).unwrap();

        let mut fresh = sample();
        fresh.bump_revision(&spec, false).unwrap();
        assert_eq!(fresh.revision, 8);

        let mut reset = sample();
        reset.revision = 42;
        reset.bump_revision(&spec, true).unwrap();
        assert_eq!(reset.revision, 1);
    }

    #[test]
    fn test_add_tree_registers_compressed_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(dir.path());
        let dst = dir.path().join("out");
        let mut repo = sample();

        let artifact = repo.add_tree(&env, RecipeKind::Installer, &dst).unwrap();
        assert_eq!(artifact.file_name(), "tree.tar.gz");
        assert!(dst.join("tree.tar.gz").is_file());

        let file = repo.repository_file(TREE_KEY).unwrap();
        assert_eq!(file.file_name, "tree.tar.gz");
        assert_eq!(file.compression, Compression::Gzip);
        assert_eq!(file.checksums, artifact.checksums);

        // A second publish keeps the same name instead of stacking extensions.
        repo.add_tree(&env, RecipeKind::Installer, &dst).unwrap();
        assert_eq!(repo.repository_file(TREE_KEY).unwrap().file_name, "tree.tar.gz");
    }

    #[test]
    fn test_spec_and_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(dir.path());
        let dst = dir.path().join("out");
        let mut repo = sample();
        repo.revision = 4;
        repo.last_update = "1700000000".into();

        let mut artifact = PackageArtifact::new("/build/curl-net-8.1.tar.gz");
        artifact.package = Package::new("curl", "net", "8.1");
        artifact.files = vec!["usr/bin/curl".into()];
        repo.index.push(artifact);

        repo.add_tree(&env, RecipeKind::Installer, &dst).unwrap();
        let meta = repo
            .add_metadata(&env, dst.join(REPOSITORY_SPEC_FILE), &dst)
            .unwrap();
        assert_eq!(meta.file_name(), META_TARBALL);

        let loaded = SystemRepository::read_spec_file(dst.join(REPOSITORY_SPEC_FILE)).unwrap();
        assert_eq!(loaded.name, "main");
        assert_eq!(loaded.revision, 4);
        assert_eq!(loaded.last_update, "1700000000");
        assert_eq!(loaded.repository_files, repo.repository_files);

        let unpacked = dir.path().join("metafs");
        loaded
            .repository_file(META_KEY)
            .unwrap()
            .artifact(dst.join(META_TARBALL))
            .unpack(&unpacked)
            .unwrap();
        let metadata =
            RepositoryMetadata::read_file(unpacked.join(REPOSITORY_METADATA_FILE), false).unwrap();
        let index = metadata.to_artifact_index();
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.iter().next().unwrap().path,
            PathBuf::from("curl-net-8.1.tar.gz")
        );
    }

    #[test]
    fn test_search_artifact_and_file_search() {
        let mut repo = sample();
        let mut artifact = PackageArtifact::new("curl.tar.gz");
        artifact.package = Package::new("curl", "net", "8.1");
        artifact.files = vec!["usr/bin/curl".into(), "usr/share/man/curl.1".into()];
        repo.index.push(artifact);

        assert!(repo
            .search_artifact(&Package::new("curl", "net", "8.1"))
            .is_some());
        assert!(repo
            .search_artifact(&Package::new("curl", "net", "9"))
            .is_none());

        let hits = repo.file_search("bin/curl$").unwrap();
        assert_eq!(hits, vec![Package::new("curl", "net", "8.1")]);
        // One hit per artifact even when several files match.
        assert_eq!(repo.file_search("curl").unwrap().len(), 1);
        assert!(repo.file_search("wget").unwrap().is_empty());
        assert!(repo.file_search("(").is_err());
    }

    #[test]
    fn test_snapshot() {
        let mut repo = sample();
        repo.set_repository_file(TREE_KEY, RepositoryFile::default_tree());
        let snapshot = repo.snapshot();
        assert_eq!(snapshot.repo_type, "http");
        assert_eq!(snapshot.files[TREE_KEY], TREE_TARBALL);
    }
}
