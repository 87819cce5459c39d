use keel_registry::{SyncStatus, SystemRepository};
use rayon::{
    iter::{IntoParallelRefIterator, ParallelIterator},
    ThreadPoolBuilder,
};
use tracing::{debug, info};

use crate::{
    error::{OperationError, Result},
    repositories::Repositories,
    KeelContext,
};

/// Syncs every enabled repository, at most `parallel_limit` at a time.
///
/// Emits `KeelEvent::SyncProgress` events through the context's event sink.
/// The first failing repository fails the whole sync.
pub fn sync_repositories(ctx: &KeelContext, force: bool) -> Result<Repositories> {
    let configured = ctx.configured_repositories()?;
    let workers = ctx.config().parallel_limit();
    debug!(
        force = force,
        repositories = configured.len(),
        workers = workers,
        "syncing repositories"
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("keel-sync-{idx}"))
        .build()?;

    let synced = pool.install(|| {
        configured
            .par_iter()
            .map(|repo| sync_one(ctx, repo, force))
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(Repositories::new(synced))
}

fn sync_one(ctx: &KeelContext, repo: &SystemRepository, force: bool) -> Result<SystemRepository> {
    let outcome = repo
        .sync(ctx.env(), force, ctx.events())
        .map_err(|source| {
            OperationError::Sync {
                repository: repo.name.clone(),
                source,
            }
        })?;

    match outcome.status {
        SyncStatus::Updated => {
            info!(
                "[{}] Repository synced to revision {}",
                repo.name, outcome.repository.revision
            )
        }
        SyncStatus::UpToDate => info!("[{}] Repository is up to date", repo.name),
    }
    Ok(outcome.repository)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, sync::Arc};

    use keel_config::{config::Config, environment::Environment};
    use keel_events::{CollectorSink, KeelEvent, SyncStage};
    use keel_package::DEFINITION_FILE;
    use keel_registry::{generate_repository, GeneratorOptions, RepositoryType};

    use super::*;

    fn publish(root: &Path, name: &str, package: &str) -> String {
        let tree = root.join(format!("{name}-tree/utils/{package}"));
        fs::create_dir_all(&tree).unwrap();
        fs::write(
            tree.join(DEFINITION_FILE),
            format!("name = \"{package}\"\ncategory = \"utils\"\nversion = \"1.0\"\n"),
        )
        .unwrap();

        let options = GeneratorOptions::new(Environment::new(root.join("build"), root.join("tmp")));
        let mut repo = generate_repository(
            name,
            "",
            RepositoryType::Disk,
            vec![],
            1,
            &root.join("no-packages"),
            &[root.join(format!("{name}-tree"))],
            &options,
        )
        .unwrap();
        let out = root.join("published").join(name);
        repo.write(&out.to_string_lossy(), false, &options).unwrap();
        out.to_string_lossy().into_owned()
    }

    fn config(root: &Path, repos: &[(&str, &str, i32)]) -> Config {
        let mut doc = format!(
            "repositories_path = \"{}\"\ntemp_path = \"{}\"\nparallel_limit = 2\n",
            root.join("cache").display(),
            root.join("tmp").display()
        );
        for (name, url, priority) in repos {
            doc.push_str(&format!(
                "\n[[repositories]]\nname = \"{name}\"\nurls = [\"{url}\"]\ntype = \"disk\"\npriority = {priority}\n"
            ));
        }
        Config::from_toml(&doc).unwrap()
    }

    #[test]
    fn test_sync_repositories_orders_by_priority() {
        let root = tempfile::tempdir().unwrap();
        let main = publish(root.path(), "main", "foo");
        let extra = publish(root.path(), "extra", "bar");
        let sink = Arc::new(CollectorSink::default());

        let ctx = KeelContext::new(
            config(root.path(), &[("extra", &extra, 20), ("main", &main, 2)]),
            sink.clone(),
        );
        let repos = sync_repositories(&ctx, false).unwrap();

        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["main", "extra"]);
        assert_eq!(repos.world().len(), 2);

        let completed = sink
            .events()
            .into_iter()
            .filter(|event| {
                matches!(
                    event,
                    KeelEvent::SyncProgress {
                        stage: SyncStage::Complete { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(completed, 2);

        let again = sync_repositories(&ctx, false).unwrap();
        assert_eq!(again.len(), 2);
        assert!(sink.events().iter().any(|event| {
            matches!(
                event,
                KeelEvent::SyncProgress {
                    stage: SyncStage::UpToDate,
                    ..
                }
            )
        }));
    }

    #[test]
    fn test_failing_repository_fails_sync() {
        let root = tempfile::tempdir().unwrap();
        let main = publish(root.path(), "main", "foo");
        let missing = root.path().join("missing").to_string_lossy().into_owned();

        let ctx = KeelContext::new(
            config(root.path(), &[("main", &main, 1), ("broken", &missing, 5)]),
            keel_events::null_sink(),
        );
        let err = sync_repositories(&ctx, false).unwrap_err();
        assert!(matches!(
            err,
            OperationError::Sync { ref repository, .. } if repository == "broken"
        ));
    }
}
