//! Repository descriptors for keel: publishing repositories to disk, http
//! mirrors or container registries, and syncing them into a local cache.

pub mod backend;
pub mod error;
pub mod generator;
pub mod metadata;
pub mod repository;
pub mod sync;

pub use backend::{BackendError, CompilerBackend};
pub use error::{RegistryError, Result};
pub use generator::{
    generate_repository, generator_for, GeneratorOptions, ImageGenerator, LocalGenerator,
    RepositoryGenerator,
};
pub use metadata::RepositoryMetadata;
pub use repository::{
    RepositoryFile, RepositoryType, SerializedRepository, SystemRepository, REPOSITORY_SPEC_FILE,
};
pub use sync::{SyncOutcome, SyncStatus};
