use keel_operations::{sync_repositories, KeelContext, Result, SearchHit, SearchMode};
use nu_ansi_term::Color::{Blue, Cyan, Magenta};
use tracing::info;

use crate::{cli::SearchArgs, utils::Colored};

fn mode(args: &SearchArgs) -> SearchMode {
    if args.label {
        SearchMode::Label
    } else if args.label_regex {
        SearchMode::LabelRegex
    } else if args.file {
        SearchMode::File
    } else {
        SearchMode::PackageRegex
    }
}

fn render(hit: &SearchHit<'_>) -> String {
    let package = &hit.package;
    let mut line = format!(
        "[{}] {}/{} {}",
        Colored(Magenta, &hit.repository.name),
        Colored(Blue, &package.category),
        Colored(Cyan, &package.name),
        package.version
    );
    if !package.description.is_empty() {
        line.push_str(" - ");
        line.push_str(&package.description);
    }
    line
}

pub fn search(ctx: &KeelContext, args: &SearchArgs) -> Result<()> {
    let repos = sync_repositories(ctx, false)?;
    let hits = repos.search_packages(&args.pattern, mode(args))?;

    for hit in &hits {
        info!("{}", render(hit));
        if let (SearchMode::File, Some(artifact)) = (mode(args), hit.artifact) {
            for file in &artifact.files {
                info!("    {file}");
            }
        }
    }
    if hits.is_empty() {
        info!("No packages found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use keel_package::Package;
    use keel_registry::{RepositoryType, SystemRepository};
    use serial_test::serial;

    use super::*;
    use crate::cli::{Args, Commands};

    fn search_args(argv: &[&str]) -> SearchArgs {
        match Args::parse_from(argv).command {
            Commands::Search(args) => args,
            _ => panic!("not a search command"),
        }
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(mode(&search_args(&["keel", "search", "curl"])), SearchMode::PackageRegex);
        assert_eq!(
            mode(&search_args(&["keel", "search", "autobump", "--label"])),
            SearchMode::Label
        );
        assert_eq!(
            mode(&search_args(&["keel", "search", "^k=v$", "--label-regex"])),
            SearchMode::LabelRegex
        );
        assert_eq!(
            mode(&search_args(&["keel", "search", "bin/curl", "--file"])),
            SearchMode::File
        );
        assert!(Args::try_parse_from(["keel", "search", "x", "--label", "--file"]).is_err());
    }

    #[test]
    #[serial]
    fn test_render() {
        crate::utils::set_color(false);
        let repo = SystemRepository::new("main", "", RepositoryType::Disk, vec![], 1);
        let mut package = Package::new("curl", "net", "8.1");
        package.description = "transfer tool".into();
        let hit = SearchHit {
            repository: &repo,
            package,
            artifact: None,
        };
        assert_eq!(render(&hit), "[main] net/curl 8.1 - transfer tool");
    }
}
