//! Interface to the container tooling used by registry repositories.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum BackendError {
    #[error("No compiler backend configured")]
    #[diagnostic(
        code(keel_registry::backend::not_configured),
        help("Registry repositories need a container backend to build and push images")
    )]
    NotConfigured,

    #[error("Failed to {operation} image {image}: {message}")]
    #[diagnostic(code(keel_registry::backend::failed))]
    Failed {
        operation: &'static str,
        image: String,
        message: String,
    },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(keel_registry::backend::io))]
    Io {
        action: String,
        source: std::io::Error,
    },
}

/// Builds, pushes and pulls container images.
pub trait CompilerBackend: Send + Sync {
    /// Whether `image` already exists in its registry.
    fn image_available(&self, image: &str) -> bool;

    /// Builds `image` whose root filesystem is the content of `context_dir`.
    fn build_image(&self, image: &str, context_dir: &Path) -> Result<(), BackendError>;

    fn push(&self, image: &str) -> Result<(), BackendError>;

    fn download_image(&self, image: &str) -> Result<(), BackendError>;

    /// Copies the root filesystem of a downloaded image into `destination`.
    fn extract_rootfs(&self, image: &str, destination: &Path) -> Result<(), BackendError>;
}
