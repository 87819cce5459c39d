use keel_config::error::ConfigError;
use keel_package::PackageError;
use keel_registry::RegistryError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum OperationError {
    #[error("[{repository}] {source}")]
    #[diagnostic(code(keel_operations::sync))]
    Sync {
        repository: String,
        #[source]
        #[diagnostic_source]
        source: RegistryError,
    },

    #[error("Failed to build the sync worker pool: {0}")]
    #[diagnostic(code(keel_operations::thread_pool))]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, OperationError>;
