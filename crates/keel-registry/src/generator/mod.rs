//! Publishing repositories: turning package trees and built artifacts into
//! the bundles and spec document a sync can consume.

mod image;
mod local;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use keel_config::environment::Environment;
use keel_events::{null_sink, EventSinkHandle};
use keel_package::{
    ArtifactIndex, InMemoryDatabase, PackageArtifact, PackageDatabase, Recipe, METADATA_SUFFIX,
};
use tracing::debug;
use walkdir::WalkDir;

pub use image::ImageGenerator;
pub use local::LocalGenerator;

use crate::{
    backend::{BackendError, CompilerBackend},
    error::{RegistryError, Result, StepContext},
    repository::{RepositoryType, SystemRepository},
};

/// Publishes a repository to a destination.
pub trait RepositoryGenerator {
    /// Builds the artifact index from the artifact sidecars found under
    /// `source`, dropping artifacts of packages missing from `db`.
    fn initialize(&self, source: &Path, db: &dyn PackageDatabase) -> Result<ArtifactIndex>;

    /// Publishes `repo` to `destination`: a directory for disk and http
    /// repositories, an image prefix for registry ones.
    fn generate(
        &self,
        repo: &mut SystemRepository,
        destination: &str,
        reset_revision: bool,
    ) -> Result<()>;
}

/// Everything a generator needs besides the repository itself.
#[derive(Clone)]
pub struct GeneratorOptions {
    pub env: Environment,
    pub events: EventSinkHandle,
    pub backend: Option<Arc<dyn CompilerBackend>>,
    /// Image prefix for package images built by registry repositories.
    pub image_prefix: String,
    pub push_images: bool,
    pub force_push: bool,
}

impl GeneratorOptions {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            events: null_sink(),
            backend: None,
            image_prefix: String::new(),
            push_images: false,
            force_push: false,
        }
    }

    pub fn events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompilerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn image_prefix(mut self, prefix: &str) -> Self {
        self.image_prefix = prefix.to_string();
        self
    }

    pub fn push_images(mut self, push: bool) -> Self {
        self.push_images = push;
        self
    }

    pub fn force_push(mut self, force: bool) -> Self {
        self.force_push = force;
        self
    }
}

/// The generator publishing repositories of `repo_type`.
pub fn generator_for(
    repo_type: RepositoryType,
    options: &GeneratorOptions,
) -> Result<Box<dyn RepositoryGenerator>> {
    match repo_type {
        RepositoryType::Disk | RepositoryType::Http => {
            Ok(Box::new(LocalGenerator::new(
                options.env.clone(),
                options.events.clone(),
            )))
        }
        RepositoryType::Registry => {
            let backend = options
                .backend
                .clone()
                .ok_or(RegistryError::Backend(BackendError::NotConfigured))?;
            Ok(Box::new(ImageGenerator::new(
                options.env.clone(),
                options.events.clone(),
                backend,
                &options.image_prefix,
                options.push_images,
                options.force_push,
            )))
        }
    }
}

/// Reads every artifact sidecar under `source`, in path order, keeping the
/// ones whose package is part of `db`.
pub(crate) fn collect_artifacts(
    source: &Path,
    db: &dyn PackageDatabase,
) -> Result<Vec<PackageArtifact>> {
    let mut artifacts = Vec::new();
    if !source.is_dir() {
        debug!(source = %source.display(), "no artifact directory, index left empty");
        return Ok(artifacts);
    }

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            RegistryError::IoError {
                action: format!("walking {}", source.display()),
                source: err.into(),
            }
        })?;
        let is_sidecar = entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(METADATA_SUFFIX);
        if !is_sidecar {
            continue;
        }

        let artifact = PackageArtifact::from_sidecar(entry.path())
            .step(|| format!("reading {}", entry.path().display()))?;
        if db.find_package(&artifact.package).is_err() {
            debug!(
                package = %artifact.package,
                "package not present in the tree, skipping its artifact"
            );
            continue;
        }
        artifacts.push(artifact);
    }

    Ok(artifacts)
}

/// Builds a repository descriptor ready to publish: every tree directory is
/// loaded into both the runtime and compiler trees, and the artifact index is
/// built from the sidecars under `source`.
#[allow(clippy::too_many_arguments)]
pub fn generate_repository(
    name: &str,
    description: &str,
    repo_type: RepositoryType,
    urls: Vec<String>,
    priority: i32,
    source: &Path,
    tree_dirs: &[PathBuf],
    options: &GeneratorOptions,
) -> Result<SystemRepository> {
    let mut repo = SystemRepository::new(name, description, repo_type, urls, priority);
    repo.tree = Recipe::installer(Arc::new(InMemoryDatabase::new()));
    repo.build_tree = Recipe::compiler(Arc::new(InMemoryDatabase::new()));

    for dir in tree_dirs {
        repo.tree
            .load(dir)
            .step(|| format!("loading tree {}", dir.display()))?;
        repo.build_tree
            .load(dir)
            .step(|| format!("loading compiler tree {}", dir.display()))?;
    }

    let generator = generator_for(repo_type, options)?;
    repo.index = generator
        .initialize(source, repo.tree.database().as_ref())
        .step(|| "building the repository artifact index".to_string())?;
    Ok(repo)
}

impl SystemRepository {
    /// Publishes this repository to `destination` with the generator of its
    /// type.
    pub fn write(
        &mut self,
        destination: &str,
        reset_revision: bool,
        options: &GeneratorOptions,
    ) -> Result<()> {
        generator_for(self.repo_type, options)?.generate(self, destination, reset_revision)
    }
}
