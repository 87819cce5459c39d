//! Error types for the registry crate.

use keel_config::error::ConfigError;
use keel_dl::DownloadError;
use keel_package::PackageError;
use keel_utils::error::{FileSystemError, LockError};
use miette::Diagnostic;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur while building, publishing or syncing repositories.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Unknown repository type '{0}'")]
    #[diagnostic(
        code(keel_registry::unknown_type),
        help("Supported types are: disk, http, registry (alias: docker)")
    )]
    UnknownRepositoryType(String),

    #[error("Integrity check failed for {file}")]
    #[diagnostic(
        code(keel_registry::integrity),
        help("The mirror may be serving a corrupted or partially uploaded file")
    )]
    Integrity {
        file: String,
        #[source]
        source: PackageError,
    },

    #[error("Malformed repository descriptor: {0}")]
    #[diagnostic(code(keel_registry::malformed))]
    MalformedDescriptor(String),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::transport))]
    Transport(#[from] DownloadError),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::backend))]
    Backend(#[from] BackendError),

    #[error("{context}: {source}")]
    #[diagnostic(code(keel_registry::context))]
    Context {
        context: String,
        source: Box<RegistryError>,
    },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(keel_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(
        code(keel_registry::json),
        help("The repository document may be corrupted or in an invalid format")
    )]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::package))]
    Package(#[from] PackageError),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::fs))]
    FileSystem(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::lock))]
    Lock(#[from] LockError),

    #[error(transparent)]
    #[diagnostic(code(keel_registry::config))]
    Config(#[from] ConfigError),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// The innermost error, skipping `Context` wrappers.
    pub fn root(&self) -> &RegistryError {
        match self {
            RegistryError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

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
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

/// Wraps any registry-convertible error with the step that failed.
pub trait StepContext<T> {
    fn step<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T, E> StepContext<T> for std::result::Result<T, E>
where
    E: Into<RegistryError>,
{
    fn step<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::Context {
                context: context(),
                source: Box::new(err.into()),
            }
        })
    }
}
