use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use regex::Regex;

use crate::{
    error::{PackageError, Result},
    package::Package,
    version::compare_versions,
};

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| {
        PackageError::InvalidPattern {
            pattern: pattern.to_string(),
            source: err,
        }
    })
}

/// Storage of package definitions keyed by fingerprint.
///
/// Only `create_package` and `world` are required; lookups default to a scan
/// over `world`.
pub trait PackageDatabase: Send + Sync {
    /// Stores a package, replacing any previous one with the same fingerprint.
    /// Returns the fingerprint.
    fn create_package(&self, package: Package) -> Result<String>;

    /// All stored packages, ordered by fingerprint.
    fn world(&self) -> Vec<Package>;

    fn find_package(&self, package: &Package) -> Result<Package> {
        self.world()
            .into_iter()
            .find(|p| p.matches(package))
            .ok_or_else(|| PackageError::NotFound(package.human_readable()))
    }

    /// Resolves `package` to a concrete package: exact lookup for concrete
    /// versions, highest satisfying version for selectors.
    fn find_package_candidate(&self, package: &Package) -> Result<Package> {
        if !package.is_selector() {
            return self.find_package(package);
        }

        let selector = package.selector()?;
        self.world()
            .into_iter()
            .filter(|p| p.same_atom(package) && selector.matches(&p.version))
            .max_by(|a, b| compare_versions(&a.version, &b.version))
            .ok_or_else(|| PackageError::NotFound(package.human_readable()))
    }

    /// Packages whose `category/name` matches the regular expression.
    fn find_package_match(&self, pattern: &str) -> Result<Vec<Package>> {
        let re = compile(pattern)?;
        Ok(self
            .world()
            .into_iter()
            .filter(|p| re.is_match(&format!("{}/{}", p.category, p.name)))
            .collect())
    }

    /// Packages carrying a label with exactly this key.
    fn find_package_label(&self, label: &str) -> Result<Vec<Package>> {
        Ok(self
            .world()
            .into_iter()
            .filter(|p| p.has_label(label))
            .collect())
    }

    /// Packages with a `key=value` label matching the regular expression.
    fn find_package_label_match(&self, pattern: &str) -> Result<Vec<Package>> {
        let re = compile(pattern)?;
        Ok(self
            .world()
            .into_iter()
            .filter(|p| p.match_label(&re))
            .collect())
    }
}

/// Thread-safe in-memory package database.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    packages: RwLock<BTreeMap<String, Package>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(fingerprint)
    }
}

impl PackageDatabase for InMemoryDatabase {
    fn create_package(&self, package: Package) -> Result<String> {
        let fingerprint = package.fingerprint();
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint.clone(), package);
        Ok(fingerprint)
    }

    fn world(&self) -> Vec<Package> {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn find_package(&self, package: &Package) -> Result<Package> {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&package.fingerprint())
            .cloned()
            .ok_or_else(|| PackageError::NotFound(package.human_readable()))
    }
}
