//! Error types for the package crate.

use std::path::PathBuf;

use keel_utils::error::{FileSystemError, HashError};
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur during package operations.
#[derive(Error, Diagnostic, Debug)]
pub enum PackageError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(keel_package::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Package not found: {0}")]
    #[diagnostic(code(keel_package::not_found))]
    NotFound(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    #[diagnostic(code(keel_package::pattern))]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid version selector '{0}'")]
    #[diagnostic(
        code(keel_package::selector),
        help("Use comparators such as '>=1.0', '<2.0' or '*'")
    )]
    InvalidSelector(String),

    #[error("Checksum mismatch for {path} ({algorithm}): expected {expected}, got {actual}")]
    #[diagnostic(
        code(keel_package::checksum_mismatch),
        help("The file may be corrupted or tampered with, try syncing again")
    )]
    ChecksumMismatch {
        path: PathBuf,
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("No checksums recorded for {0}")]
    #[diagnostic(code(keel_package::missing_checksums))]
    MissingChecksums(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    #[diagnostic(code(keel_package::definition))]
    InvalidDefinition {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(keel_package::toml_ser))]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    #[diagnostic(code(keel_package::json))]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(keel_package::hash))]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(keel_package::fs))]
    FileSystem(#[from] FileSystemError),
}

/// A specialized Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            PackageError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
