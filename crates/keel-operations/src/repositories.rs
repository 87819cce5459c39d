//! Merged view over every synchronized repository.
//!
//! Repositories are kept sorted by ascending priority value: the first
//! repository has the highest precedence. Repositories sharing a priority keep
//! the order they were added in.

use std::collections::{BTreeMap, HashSet};

use keel_package::{Package, PackageDatabase};
use keel_registry::SystemRepository;
use tracing::{debug, trace};

use crate::error::Result;

#[derive(Debug, Default)]
pub struct Repositories {
    repos: Vec<SystemRepository>,
}

/// A requested package found in a repository.
#[derive(Debug)]
pub struct PackageMatch<'a> {
    pub repository: &'a SystemRepository,
    pub package: Package,
}

impl Repositories {
    pub fn new(repos: Vec<SystemRepository>) -> Self {
        let mut repositories = Self {
            repos,
        };
        repositories.sort();
        repositories
    }

    pub fn push(&mut self, repo: SystemRepository) {
        self.repos.push(repo);
        self.sort();
    }

    fn sort(&mut self) {
        self.repos.sort_by_key(|repo| repo.priority);
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    /// Repositories in precedence order.
    pub fn iter(&self) -> std::slice::Iter<'_, SystemRepository> {
        self.repos.iter()
    }

    pub fn as_slice(&self) -> &[SystemRepository] {
        &self.repos
    }

    pub fn get(&self, name: &str) -> Option<&SystemRepository> {
        self.repos.iter().find(|repo| repo.name == name)
    }

    /// Every package of every repository, one per fingerprint. When several
    /// repositories define a fingerprint, the highest precedence one wins.
    pub fn world(&self) -> Vec<Package> {
        let mut world = BTreeMap::new();
        for repo in self.repos.iter().rev() {
            for package in repo.tree.database().world() {
                world.insert(package.fingerprint(), package);
            }
        }
        world.into_values().collect()
    }

    /// Copies one definition per fingerprint into `target`, walking from the
    /// lowest precedence repository up and keeping the first definition seen.
    pub fn sync_database(&self, target: &dyn PackageDatabase) -> Result<()> {
        let mut seen = HashSet::new();
        for repo in self.repos.iter().rev() {
            for package in repo.tree.database().world() {
                if seen.insert(package.fingerprint()) {
                    target.create_package(package)?;
                }
            }
        }
        debug!(packages = seen.len(), "synced package database");
        Ok(())
    }

    /// For each requested package, the first repository defining exactly
    /// that package. Packages found nowhere are left out.
    pub fn package_matches(&self, requested: &[Package]) -> Vec<PackageMatch<'_>> {
        requested
            .iter()
            .filter_map(|wanted| {
                self.repos.iter().find_map(|repo| {
                    repo.tree
                        .database()
                        .find_package(wanted)
                        .ok()
                        .map(|package| {
                            PackageMatch {
                                repository: repo,
                                package,
                            }
                        })
                })
            })
            .collect()
    }

    /// Resolves version selectors to the best candidate of the first
    /// repository that can satisfy them. Concrete packages are returned as
    /// they are, once each.
    pub fn resolve_selectors(&self, requested: &[Package]) -> Vec<Package> {
        let mut resolved = Vec::with_capacity(requested.len());
        for wanted in requested {
            if !wanted.is_selector() {
                resolved.push(wanted.clone());
                continue;
            }

            let candidate = self.repos.iter().find_map(|repo| {
                repo.tree.database().find_package_candidate(wanted).ok()
            });
            match candidate {
                Some(package) => resolved.push(package),
                None => trace!(package = %wanted, "no repository satisfies selector"),
            }
        }
        resolved
    }
}

impl IntoIterator for Repositories {
    type Item = SystemRepository;
    type IntoIter = std::vec::IntoIter<SystemRepository>;

    fn into_iter(self) -> Self::IntoIter {
        self.repos.into_iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use keel_package::{InMemoryDatabase, PackageArtifact};
    use keel_registry::RepositoryType;

    use super::*;

    pub fn package(name: &str, version: &str, description: &str) -> Package {
        let mut package = Package::new(name, "utils", version);
        package.description = description.to_string();
        package
    }

    pub fn repository(name: &str, priority: i32, packages: &[Package]) -> SystemRepository {
        let mut repo = SystemRepository::new(name, "", RepositoryType::Disk, vec![], priority);
        for package in packages {
            repo.tree.database().create_package(package.clone()).unwrap();
            let mut artifact =
                PackageArtifact::new(format!("{}.tar.gz", package.fingerprint()));
            artifact.package = package.clone();
            artifact.files = vec![format!("/usr/bin/{}", package.name)];
            repo.index.push(artifact);
        }
        repo
    }

    fn names(repos: &Repositories) -> Vec<&str> {
        repos.iter().map(|repo| repo.name.as_str()).collect()
    }

    #[test]
    fn test_sorted_by_priority_with_stable_ties() {
        let mut repos = Repositories::new(vec![
            repository("b", 10, &[]),
            repository("a", 1, &[]),
            repository("c", 10, &[]),
        ]);
        assert_eq!(names(&repos), ["a", "b", "c"]);

        repos.push(repository("d", 5, &[]));
        repos.push(repository("e", 10, &[]));
        assert_eq!(names(&repos), ["a", "d", "b", "c", "e"]);
        assert_eq!(repos.get("d").unwrap().priority, 5);
        assert!(repos.get("z").is_none());
    }

    #[test]
    fn test_world_prefers_highest_precedence() {
        let repos = Repositories::new(vec![
            repository("b", 10, &[package("foo", "1.0", "from b"), package("bar", "2.0", "")]),
            repository("a", 1, &[package("foo", "1.0", "from a")]),
        ]);

        let world = repos.world();
        assert_eq!(world.len(), 2);
        let foo = world.iter().find(|p| p.name == "foo").unwrap();
        assert_eq!(foo.description, "from a");
    }

    #[test]
    fn test_sync_database_inserts_each_fingerprint_once() {
        let repos = Repositories::new(vec![
            repository("a", 1, &[package("foo", "1.0", "from a")]),
            repository("b", 10, &[package("foo", "1.0", "from b"), package("bar", "2.0", "")]),
        ]);

        let db = InMemoryDatabase::new();
        repos.sync_database(&db).unwrap();
        assert_eq!(db.len(), 2);
        assert!(db.contains(&package("bar", "2.0", "").fingerprint()));
    }

    #[test]
    fn test_package_matches_first_repository_wins() {
        let repos = Repositories::new(vec![
            repository("b", 10, &[package("foo", "1.0", "from b"), package("bar", "2.0", "")]),
            repository("a", 1, &[package("foo", "1.0", "from a")]),
        ]);

        let matches = repos.package_matches(&[
            Package::new("foo", "utils", "1.0"),
            Package::new("bar", "utils", "2.0"),
            Package::new("baz", "utils", "1.0"),
        ]);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].repository.name, "a");
        assert_eq!(matches[0].package.description, "from a");
        assert_eq!(matches[1].repository.name, "b");
    }

    #[test]
    fn test_resolve_selectors() {
        let repos = Repositories::new(vec![
            repository("a", 1, &[package("bar", "0.5", "")]),
            repository("b", 10, &[package("bar", "1.2", ""), package("bar", "1.4", "")]),
        ]);

        let concrete = Package::new("bar", "utils", "2.0");
        let resolved = repos.resolve_selectors(&[
            concrete.clone(),
            Package::new("bar", "utils", ">=1.0"),
            Package::new("bar", "utils", ">=9.0"),
        ]);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0], concrete);
        assert_eq!(resolved[1].version, "1.4");
    }
}
