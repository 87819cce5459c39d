//! Searching packages across every synchronized repository.

use keel_package::{Package, PackageArtifact, PackageError};
use keel_registry::SystemRepository;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use regex::Regex;
use tracing::debug;

use crate::{error::Result, repositories::Repositories};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Packages carrying a label with this exact key.
    Label,
    /// Packages with a `key=value` label matching a regular expression.
    LabelRegex,
    /// Packages whose `category/name` matches a regular expression.
    PackageRegex,
    /// Packages installing a file whose path matches a regular expression.
    File,
}

/// A package found by a search, with the repository it comes from.
#[derive(Debug)]
pub struct SearchHit<'a> {
    pub repository: &'a SystemRepository,
    pub package: Package,
    pub artifact: Option<&'a PackageArtifact>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| {
        PackageError::InvalidPattern {
            pattern: pattern.to_string(),
            source: err,
        }
        .into()
    })
}

/// Hits for every artifact installing a matching file. An artifact yields at
/// most one hit; several artifacts of one package yield several hits.
fn file_hits<'a>(repo: &'a SystemRepository, re: &Regex) -> Vec<SearchHit<'a>> {
    repo.index
        .iter()
        .filter(|artifact| artifact.files.iter().any(|file| re.is_match(file)))
        .map(|artifact| {
            SearchHit {
                repository: repo,
                package: artifact.package.clone(),
                artifact: Some(artifact),
            }
        })
        .collect()
}

fn repository_hits<'a>(
    repo: &'a SystemRepository,
    pattern: &str,
    mode: SearchMode,
) -> Result<Vec<SearchHit<'a>>> {
    let db = repo.tree.database();
    let packages = match mode {
        SearchMode::Label => db.find_package_label(pattern)?,
        SearchMode::LabelRegex => db.find_package_label_match(pattern)?,
        SearchMode::PackageRegex => db.find_package_match(pattern)?,
        SearchMode::File => return Ok(file_hits(repo, &compile(pattern)?)),
    };

    Ok(packages
        .into_iter()
        .map(|package| {
            let artifact = repo.search_artifact(&package);
            SearchHit {
                repository: repo,
                package,
                artifact,
            }
        })
        .collect())
}

impl Repositories {
    /// Searches every repository, regardless of priority. Hits are grouped by
    /// repository in precedence order; an empty result is not an error.
    pub fn search_packages(&self, pattern: &str, mode: SearchMode) -> Result<Vec<SearchHit<'_>>> {
        debug!(pattern, mode = ?mode, repositories = self.len(), "searching packages");

        let per_repo: Vec<Vec<SearchHit<'_>>> = self
            .as_slice()
            .par_iter()
            .map(|repo| repository_hits(repo, pattern, mode))
            .collect::<Result<_>>()?;

        Ok(per_repo.into_iter().flatten().collect())
    }

    pub fn search(&self, pattern: &str) -> Result<Vec<SearchHit<'_>>> {
        self.search_packages(pattern, SearchMode::PackageRegex)
    }

    pub fn search_label(&self, label: &str) -> Result<Vec<SearchHit<'_>>> {
        self.search_packages(label, SearchMode::Label)
    }

    pub fn search_label_match(&self, pattern: &str) -> Result<Vec<SearchHit<'_>>> {
        self.search_packages(pattern, SearchMode::LabelRegex)
    }

    pub fn search_file(&self, pattern: &str) -> Result<Vec<SearchHit<'_>>> {
        self.search_packages(pattern, SearchMode::File)
    }
}

#[cfg(test)]
mod tests {
    use keel_package::PackageArtifact;

    use super::*;
    use crate::{
        repositories::tests::{package, repository},
        OperationError,
    };

    fn labeled(name: &str, labels: &[(&str, &str)]) -> Package {
        let mut package = package(name, "1.0", "");
        for (key, value) in labels {
            package.labels.insert(key.to_string(), value.to_string());
        }
        package
    }

    fn fixture() -> Repositories {
        Repositories::new(vec![
            repository(
                "extra",
                10,
                &[
                    labeled("foo", &[("autobump", "true")]),
                    labeled("qux", &[("maintainer", "ops")]),
                ],
            ),
            repository(
                "main",
                1,
                &[
                    labeled("foo", &[("autobump", "false")]),
                    labeled("bar", &[]),
                ],
            ),
        ])
    }

    #[test]
    fn test_search_by_name() {
        let repos = fixture();
        let hits = repos.search("utils/fo+").unwrap();
        let found: Vec<_> = hits
            .iter()
            .map(|hit| (hit.repository.name.as_str(), hit.package.name.as_str()))
            .collect();
        assert_eq!(found, [("main", "foo"), ("extra", "foo")]);
        assert!(hits.iter().all(|hit| hit.artifact.is_some()));

        assert!(repos.search("^nothing$").unwrap().is_empty());
    }

    #[test]
    fn test_search_labels() {
        let repos = fixture();
        assert_eq!(repos.search_label("autobump").unwrap().len(), 2);
        assert_eq!(repos.search_label("auto").unwrap().len(), 0);

        let hits = repos.search_label_match("autobump=true").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].repository.name, "extra");

        let hits = repos.search_label_match("^maintainer=").unwrap();
        assert_eq!(hits[0].package.name, "qux");
    }

    #[test]
    fn test_search_file() {
        let repos = fixture();
        let hits = repos.search_file("bin/bar").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].package.name, "bar");
        assert_eq!(hits[0].artifact.unwrap().files, vec!["/usr/bin/bar".to_string()]);

        assert!(repos.search_file("bin/baz").unwrap().is_empty());
    }

    #[test]
    fn test_search_file_reports_every_artifact() {
        let mut repo = repository("main", 1, &[package("foo", "1.0", "")]);
        let mut debug_build = PackageArtifact::new("foo-utils-1.0-debug.tar.gz");
        debug_build.package = package("foo", "1.0", "");
        debug_build.files = vec!["/usr/bin/foo".into(), "/usr/lib/debug/foo".into()];
        repo.index.push(debug_build);

        let repos = Repositories::new(vec![repo]);
        assert_eq!(repos.search_file("foo$").unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_pattern() {
        let repos = fixture();
        assert!(matches!(
            repos.search_file("("),
            Err(OperationError::Package(PackageError::InvalidPattern { .. }))
        ));
        assert!(repos.search("[").is_err());
    }
}
