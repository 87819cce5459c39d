use keel_utils::error::FileSystemError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(keel_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(keel_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Invalid repository name: {0}")]
    #[diagnostic(
        code(keel_config::invalid_repository),
        help("Repository names must be non-empty and contain no path separators")
    )]
    InvalidRepository(String),

    #[error("Repository {0} declares no urls")]
    #[diagnostic(
        code(keel_config::missing_urls),
        help("Add at least one mirror to the `urls` list of the repository")
    )]
    MissingUrls(String),

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(keel_config::duplicate_repo),
        help("Each repository must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error("Error while {action}")]
    #[diagnostic(code(keel_config::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(keel_config::fs))]
    FileSystem(#[from] FileSystemError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
