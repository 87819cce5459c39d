//! Package model for keel: package definitions, version selectors, package
//! databases, package trees and the artifacts built from them.

pub mod artifact;
pub mod database;
pub mod error;
pub mod package;
pub mod recipe;
pub mod version;

pub use artifact::{ArtifactIndex, Checksums, Compression, PackageArtifact, METADATA_SUFFIX};
pub use database::{InMemoryDatabase, PackageDatabase};
pub use error::{ErrorContext, PackageError, Result};
pub use package::Package;
pub use recipe::{Recipe, RecipeKind, BUILD_FILE, DEFINITION_FILE};
pub use version::{compare_versions, is_selector, parse_version, VersionSelector};
