//! Bringing a configured repository up to date with its published copy.
//!
//! A sync downloads the remote spec document first and only fetches bundles
//! when the cached copy is stale. Bundles are verified before anything in the
//! cache is touched, and the cache directories are swapped in as a whole.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use keel_config::environment::Environment;
use keel_dl::{client_for, Client, RepoData};
use keel_events::{EventSinkHandle, KeelEvent, SyncStage};
use keel_package::{InMemoryDatabase, PackageArtifact, Recipe};
use keel_utils::{
    fs::{ensure_dir_exists, replace_dir, write_atomic},
    lock::FileLock,
};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::{
    error::{ErrorContext, RegistryError, Result, StepContext},
    metadata::RepositoryMetadata,
    repository::{
        RepositoryFile, RepositoryType, SystemRepository, META_KEY, REPOSITORY_METADATA_FILE,
        REPOSITORY_SPEC_FILE, TREE_KEY,
    },
};

/// Cache directory holding the unpacked runtime tree.
pub const TREE_DIR: &str = "treefs";
/// Cache directory holding the unpacked metadata document.
pub const META_DIR: &str = "metafs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// New bundles were downloaded.
    Updated,
    /// The cache already matched the remote revision.
    UpToDate,
}

/// A synchronized descriptor with its tree and index loaded.
#[derive(Debug)]
pub struct SyncOutcome {
    pub repository: SystemRepository,
    pub status: SyncStatus,
}

/// A verified bundle unpacked next to its final location.
struct Staged {
    _dir: TempDir,
    unpacked: PathBuf,
    target: PathBuf,
}

fn stage(artifact: &PackageArtifact, target: &Path) -> Result<Staged> {
    let parent = target.parent().unwrap_or(Path::new("."));
    ensure_dir_exists(parent)?;

    let dir = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .with_context(|| format!("creating a staging directory in {}", parent.display()))?;
    let unpacked = dir.path().join("content");
    artifact
        .unpack(&unpacked)
        .step(|| format!("unpacking {}", artifact.path.display()))?;

    Ok(Staged {
        _dir: dir,
        unpacked,
        target: target.to_path_buf(),
    })
}

impl SystemRepository {
    /// Syncs this configured repository through the transport of its type.
    pub fn sync(
        &self,
        env: &Environment,
        force: bool,
        events: &EventSinkHandle,
    ) -> Result<SyncOutcome> {
        let workdir = env.temp_dir("sync")?;
        let client = client_for(
            self.repo_type.transport(),
            RepoData::new(self.urls.clone(), self.authentication.clone()),
            workdir.path(),
        );
        self.sync_with_client(client.as_ref(), env, force, events)
    }

    pub fn sync_with_client(
        &self,
        client: &dyn Client,
        env: &Environment,
        force: bool,
        events: &EventSinkHandle,
    ) -> Result<SyncOutcome> {
        let progress = |stage: SyncStage| {
            events.emit(KeelEvent::SyncProgress {
                repo_name: self.name.clone(),
                stage,
            })
        };

        let repo_dir = env.repository_dir(&self.name);
        let _lock = match FileLock::try_acquire(env.lock_dir(), &self.name)? {
            Some(lock) => lock,
            None => {
                info!("Waiting for another sync of {} to finish", self.name);
                FileLock::acquire(env.lock_dir(), &self.name)?
            }
        };

        progress(SyncStage::Fetching);
        let spec_file = client
            .download_file(REPOSITORY_SPEC_FILE)
            .step(|| format!("downloading the spec of repository {}", self.name))?;
        let spec = fs::read(&spec_file)
            .with_context(|| format!("reading {}", spec_file.display()))?;
        let mut remote = SystemRepository::from_remote_spec_document(&spec, self.repo_type)
            .step(|| format!("loading the spec of repository {}", self.name))?;

        let tree_dir = self
            .tree_path
            .clone()
            .unwrap_or_else(|| repo_dir.join(TREE_DIR));
        let meta_dir = self
            .meta_path
            .clone()
            .unwrap_or_else(|| repo_dir.join(META_DIR));
        let cached_spec = repo_dir.join(REPOSITORY_SPEC_FILE);

        if self.cached
            && !force
            && is_current(&remote, self.repo_type, &cached_spec, &tree_dir, &meta_dir)
        {
            info!(
                "Repository {} is up to date at revision {}",
                self.name, remote.revision
            );
            progress(SyncStage::UpToDate);
            remote.load_cache(&tree_dir, &meta_dir)?;
            return Ok(self.finish(remote, tree_dir, meta_dir, SyncStatus::UpToDate, &progress));
        }

        let tree = self.fetch_bundle(client, remote.repository_file(TREE_KEY)?, &progress)?;
        let meta = self.fetch_bundle(client, remote.repository_file(META_KEY)?, &progress)?;

        progress(SyncStage::Unpacking);
        if self.cached {
            let staged = [stage(&tree, &tree_dir)?, stage(&meta, &meta_dir)?];
            for staged in &staged {
                replace_dir(&staged.unpacked, &staged.target)?;
            }
            write_atomic(&cached_spec, &spec)?;
            remote.load_cache(&tree_dir, &meta_dir)?;
        } else {
            let scratch_tree = env.temp_dir(TREE_DIR)?;
            let scratch_meta = env.temp_dir(META_DIR)?;
            tree.unpack(scratch_tree.path())
                .step(|| format!("unpacking {}", tree.path.display()))?;
            meta.unpack(scratch_meta.path())
                .step(|| format!("unpacking {}", meta.path.display()))?;
            remote.load_cache(scratch_tree.path(), scratch_meta.path())?;
        }

        info!(
            "Repository {} synced to revision {}",
            self.name, remote.revision
        );
        Ok(self.finish(remote, tree_dir, meta_dir, SyncStatus::Updated, &progress))
    }

    fn fetch_bundle(
        &self,
        client: &dyn Client,
        file: &RepositoryFile,
        progress: &impl Fn(SyncStage),
    ) -> Result<PackageArtifact> {
        let name = &file.file_name;
        progress(SyncStage::Downloading {
            file: name.clone(),
        });
        let path = client
            .download_file(name)
            .step(|| format!("downloading {name} of repository {}", self.name))?;

        progress(SyncStage::Verifying {
            file: name.clone(),
        });
        let artifact = file.artifact(path);
        artifact.verify().map_err(|source| {
            RegistryError::Integrity {
                file: name.clone(),
                source,
            }
        })?;
        debug!(repository = %self.name, file = %name, "bundle verified");
        Ok(artifact)
    }

    /// Loads the metadata index and a fresh runtime tree from unpacked
    /// bundles.
    fn load_cache(&mut self, tree_dir: &Path, meta_dir: &Path) -> Result<()> {
        let metadata_file = meta_dir.join(REPOSITORY_METADATA_FILE);
        let metadata = RepositoryMetadata::read_file(&metadata_file, false)
            .step(|| format!("loading the metadata of repository {}", self.name))?;
        self.index = metadata.to_artifact_index();

        let mut tree = Recipe::installer(Arc::new(InMemoryDatabase::new()));
        tree.load(tree_dir)
            .step(|| format!("loading the tree of repository {}", self.name))?;
        self.tree = tree;
        Ok(())
    }

    /// Local settings take precedence over the published ones.
    fn finish(
        &self,
        mut remote: SystemRepository,
        tree_dir: PathBuf,
        meta_dir: PathBuf,
        status: SyncStatus,
        progress: &impl Fn(SyncStage),
    ) -> SyncOutcome {
        remote.name = self.name.clone();
        remote.urls = self.urls.clone();
        remote.authentication = self.authentication.clone();
        remote.repo_type = self.repo_type;
        remote.priority = self.priority;
        remote.verify = self.verify;
        remote.cached = self.cached;
        if self.cached {
            remote.tree_path = Some(tree_dir);
            remote.meta_path = Some(meta_dir);
        } else {
            remote.tree_path = None;
            remote.meta_path = None;
        }

        progress(SyncStage::Complete {
            revision: remote.revision,
            package_count: remote.tree.database().world().len(),
        });
        SyncOutcome {
            repository: remote,
            status,
        }
    }
}

/// Whether the cache already holds `remote`'s revision.
fn is_current(
    remote: &SystemRepository,
    local_type: RepositoryType,
    cached_spec: &Path,
    tree_dir: &Path,
    meta_dir: &Path,
) -> bool {
    if !cached_spec.is_file() || !tree_dir.is_dir() || !meta_dir.is_dir() {
        return false;
    }
    let cached = fs::read(cached_spec)
        .with_context(|| format!("reading {}", cached_spec.display()))
        .and_then(|data| SystemRepository::from_remote_spec_document(&data, local_type));
    match cached {
        Ok(cached) => {
            cached.revision == remote.revision && cached.last_update == remote.last_update
        }
        Err(err) => {
            debug!(spec = %cached_spec.display(), error = %err, "ignoring unreadable cached spec");
            false
        }
    }
}
