use keel_operations::{sync_repositories, KeelContext, Result};
use keel_utils::time::format_unix_timestamp;
use nu_ansi_term::Color::{Green, Magenta};
use tracing::info;

use crate::utils::Colored;

pub fn sync(ctx: &KeelContext, force: bool) -> Result<()> {
    let repos = sync_repositories(ctx, force)?;
    for repo in repos.iter() {
        info!(
            "[{}] {} revision {} ({} packages, updated {})",
            Colored(Magenta, &repo.name),
            Colored(Green, "ok"),
            repo.revision,
            repo.tree.database().world().len(),
            format_unix_timestamp(&repo.last_update)
        );
    }
    if repos.is_empty() {
        info!("No repositories enabled");
    }
    Ok(())
}
