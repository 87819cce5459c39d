//! Package trees: directories of `definition.toml` files loaded into a
//! [`PackageDatabase`].

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use keel_utils::fs::{copy_file, ensure_dir_exists};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::{
    database::{InMemoryDatabase, PackageDatabase},
    error::{ErrorContext, PackageError, Result},
    package::Package,
};

/// File describing one package inside a tree.
pub const DEFINITION_FILE: &str = "definition.toml";

/// Build instructions kept alongside a definition in compiler trees.
pub const BUILD_FILE: &str = "build.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeKind {
    /// Runtime tree: definitions only.
    Installer,
    /// Compiler tree: definitions plus the files needed to rebuild them.
    Compiler,
}

/// A package tree backed by a database.
#[derive(Clone)]
pub struct Recipe {
    kind: RecipeKind,
    database: Arc<dyn PackageDatabase>,
    sources: BTreeMap<String, PathBuf>,
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("kind", &self.kind)
            .field("packages", &self.database.world().len())
            .finish()
    }
}

impl Recipe {
    pub fn new(kind: RecipeKind, database: Arc<dyn PackageDatabase>) -> Self {
        Self {
            kind,
            database,
            sources: BTreeMap::new(),
        }
    }

    pub fn installer(database: Arc<dyn PackageDatabase>) -> Self {
        Self::new(RecipeKind::Installer, database)
    }

    pub fn compiler(database: Arc<dyn PackageDatabase>) -> Self {
        Self::new(RecipeKind::Compiler, database)
    }

    /// Empty installer tree over a fresh in-memory database.
    pub fn empty() -> Self {
        Self::installer(Arc::new(InMemoryDatabase::new()))
    }

    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    pub fn database(&self) -> &Arc<dyn PackageDatabase> {
        &self.database
    }

    /// Loads every definition found under `path` into the database.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let root = path.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|err| {
                PackageError::IoError {
                    action: format!("walking tree {}", root.display()),
                    source: err.into(),
                }
            })?;
            if !entry.file_type().is_file() || entry.file_name() != DEFINITION_FILE {
                continue;
            }

            let content = fs::read_to_string(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            let package: Package = toml::from_str(&content).map_err(|err| {
                PackageError::InvalidDefinition {
                    path: entry.path().to_path_buf(),
                    source: err,
                }
            })?;

            trace!(package = %package, path = %entry.path().display(), "loaded definition");
            if let Some(dir) = entry.path().parent() {
                self.sources.insert(package.fingerprint(), dir.to_path_buf());
            }
            self.database.create_package(package)?;
            loaded += 1;
        }

        debug!(tree = %root.display(), loaded, "loaded package tree");
        Ok(loaded)
    }

    /// Writes the tree to `dst` as `<category>/<name>/<version>/definition.toml`.
    ///
    /// Compiler trees also copy the remaining files of each package's source
    /// directory, when it was loaded from disk.
    pub fn save<P: AsRef<Path>>(&self, dst: P) -> Result<()> {
        let dst = dst.as_ref();
        ensure_dir_exists(dst)?;

        for package in self.database.world() {
            let dir = dst
                .join(path_component(&package.category))
                .join(path_component(&package.name))
                .join(path_component(&package.version));
            ensure_dir_exists(&dir)?;

            let definition = toml::to_string_pretty(&package)?;
            fs::write(dir.join(DEFINITION_FILE), definition)
                .with_context(|| format!("writing definition for {package}"))?;

            if self.kind == RecipeKind::Compiler {
                if let Some(source) = self.sources.get(&package.fingerprint()) {
                    copy_sources(source, &dir)?;
                }
            }
        }

        Ok(())
    }
}

fn path_component(value: &str) -> String {
    if value.is_empty() {
        return "_".to_string();
    }
    value.replace(['/', '\\'], "_")
}

fn copy_sources(source: &Path, dir: &Path) -> Result<()> {
    let entries =
        fs::read_dir(source).with_context(|| format!("reading {}", source.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", source.display()))?;
        let path = entry.path();
        if !path.is_file() || entry.file_name() == DEFINITION_FILE {
            continue;
        }
        copy_file(&path, dir.join(entry.file_name()))?;
    }
    Ok(())
}
