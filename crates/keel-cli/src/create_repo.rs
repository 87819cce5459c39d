use std::sync::Arc;

use keel_operations::KeelContext;
use keel_registry::{generate_repository, GeneratorOptions, RepositoryType, Result};
use tracing::{debug, info};

use crate::{backend::DockerBackend, cli::CreateRepoArgs};

fn options(ctx: &KeelContext, args: &CreateRepoArgs, repo_type: RepositoryType) -> GeneratorOptions {
    let mut options = GeneratorOptions::new(ctx.env().clone())
        .events(ctx.events().clone())
        .image_prefix(&args.image_prefix)
        .push_images(args.push_images)
        .force_push(args.force_push);
    if repo_type == RepositoryType::Registry {
        options = options.backend(Arc::new(DockerBackend::new(&args.backend)));
    }
    options
}

pub fn create_repo(ctx: &KeelContext, args: &CreateRepoArgs) -> Result<()> {
    let repo_type: RepositoryType = args.repo_type.parse()?;
    let options = options(ctx, args, repo_type);
    debug!(
        name = %args.name,
        repo_type = %repo_type,
        output = %args.output,
        "creating repository"
    );

    let mut repo = generate_repository(
        &args.name,
        &args.description,
        repo_type,
        args.urls.clone(),
        args.priority,
        &args.packages,
        &args.trees,
        &options,
    )?;
    info!(
        "Repository {} indexes {} artifacts of {} packages",
        repo.name,
        repo.index.len(),
        repo.tree.database().world().len()
    );

    repo.write(&args.output, args.reset_revision, &options)?;
    info!("Repository {} written at revision {}", repo.name, repo.revision);
    Ok(())
}
