//! Explicit runtime context handed to generators and sync operations.
//!
//! Everything that would otherwise be read from process-wide state (where
//! repositories are cached, where scratch directories go, where locks live)
//! is carried by an [`Environment`] value.

use std::path::{Path, PathBuf};

use keel_utils::fs::ensure_dir_exists;
use tempfile::TempDir;

use crate::{
    config::Config,
    error::{ConfigError, Result},
};

#[derive(Clone, Debug)]
pub struct Environment {
    repositories_path: PathBuf,
    temp_path: PathBuf,
}

impl Environment {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(repositories_path: P, temp_path: Q) -> Self {
        Self {
            repositories_path: repositories_path.into(),
            temp_path: temp_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.get_repositories_path(), config.get_temp_path())
    }

    /// Root of the per-repository cache directories.
    pub fn repositories_path(&self) -> &Path {
        &self.repositories_path
    }

    /// Cache directory of a single repository.
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.repositories_path.join(name)
    }

    /// Directory holding the per-repository lock files.
    pub fn lock_dir(&self) -> PathBuf {
        self.repositories_path.join(".locks")
    }

    /// Creates a fresh scratch directory, removed when the handle is dropped.
    pub fn temp_dir(&self, prefix: &str) -> Result<TempDir> {
        ensure_dir_exists(&self.temp_path)?;
        tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .tempdir_in(&self.temp_path)
            .map_err(|err| {
                ConfigError::IoError {
                    action: format!("creating temporary directory for {prefix}"),
                    source: err,
                }
            })
    }
}
