use std::path::Path;

use keel_config::environment::Environment;
use keel_events::{EventSinkHandle, KeelEvent};
use keel_package::{ArtifactIndex, PackageDatabase, RecipeKind};
use keel_utils::{fs::ensure_dir_exists, time::unix_timestamp};
use tracing::info;

use super::{collect_artifacts, RepositoryGenerator};
use crate::{
    error::{Result, StepContext},
    repository::{SystemRepository, REPOSITORY_SPEC_FILE},
};

/// Publishes disk and http repositories into a local directory.
pub struct LocalGenerator {
    env: Environment,
    events: EventSinkHandle,
}

impl LocalGenerator {
    pub fn new(env: Environment, events: EventSinkHandle) -> Self {
        Self {
            env,
            events,
        }
    }
}

impl RepositoryGenerator for LocalGenerator {
    fn initialize(&self, source: &Path, db: &dyn PackageDatabase) -> Result<ArtifactIndex> {
        Ok(collect_artifacts(source, db)?.into_iter().collect())
    }

    fn generate(
        &self,
        repo: &mut SystemRepository,
        destination: &str,
        reset_revision: bool,
    ) -> Result<()> {
        let dst = Path::new(destination);
        ensure_dir_exists(dst)?;

        let spec_path = dst.join(REPOSITORY_SPEC_FILE);
        repo.last_update = unix_timestamp();
        repo.bump_revision(&spec_path, reset_revision)?;

        info!(
            "For repository {} creating revision {} and last update {}",
            repo.name, repo.revision, repo.last_update
        );

        self.events.emit(KeelEvent::RepositoryPreBuild {
            snapshot: repo.snapshot(),
            path: destination.to_string(),
        });

        repo.add_tree(&self.env, RecipeKind::Installer, dst)
            .step(|| "adding the runtime tree".to_string())?;
        repo.add_tree(&self.env, RecipeKind::Compiler, dst)
            .step(|| "adding the compiler tree".to_string())?;
        repo.add_metadata(&self.env, &spec_path, dst)
            .step(|| "adding the repository metadata".to_string())?;

        self.events.emit(KeelEvent::RepositoryPostBuild {
            snapshot: repo.snapshot(),
            path: destination.to_string(),
        });
        Ok(())
    }
}
