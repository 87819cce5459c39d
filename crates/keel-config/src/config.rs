use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use keel_utils::path::{expand_home, xdg_config_home, xdg_data_home};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{ConfigError, Result},
    repository::Repository,
};

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Root directory for keel state.
    /// Default: $KEEL_ROOT or $XDG_DATA_HOME/keel
    pub root_path: Option<String>,

    /// Path to the local clone of all repositories.
    /// Default: $root_path/repos
    pub repositories_path: Option<String>,

    /// Scratch directory for downloads and archives.
    /// Default: system temp dir
    pub temp_path: Option<String>,

    /// Maximum number of repositories synced concurrently.
    /// Default: 4
    pub parallel_limit: Option<u32>,

    /// List of configured repositories.
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// Location of the configuration file, from `$KEEL_CONFIG` or
/// `$XDG_CONFIG_HOME/keel/config.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("KEEL_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("keel").join("config.toml"),
    }
}

impl Config {
    /// Loads the configuration from the default location, falling back to an
    /// empty configuration when no file exists yet.
    pub fn new() -> Result<Self> {
        let path = default_config_path();
        if !path.exists() {
            info!(
                "No configuration found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Loads and validates the configuration at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");

        let content = fs::read_to_string(path).map_err(|err| {
            ConfigError::IoError {
                action: format!("reading config file {}", path.display()),
                source: err,
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parses and validates a configuration document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for repo in &self.repositories {
            if repo.name.is_empty() || repo.name.contains('/') {
                return Err(ConfigError::InvalidRepository(repo.name.clone()));
            }
            if repo.urls.is_empty() {
                return Err(ConfigError::MissingUrls(repo.name.clone()));
            }
            if !seen.insert(&repo.name) {
                return Err(ConfigError::DuplicateRepositoryName(repo.name.clone()));
            }
        }

        Ok(())
    }

    pub fn get_root_path(&self) -> PathBuf {
        if let Some(root) = &self.root_path {
            return expand_home(root);
        }
        match std::env::var("KEEL_ROOT") {
            Ok(root) => expand_home(&root),
            Err(_) => xdg_data_home().join("keel"),
        }
    }

    pub fn get_repositories_path(&self) -> PathBuf {
        self.repositories_path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| self.get_root_path().join("repos"))
    }

    pub fn get_temp_path(&self) -> PathBuf {
        self.temp_path
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| std::env::temp_dir().join("keel"))
    }

    pub fn parallel_limit(&self) -> usize {
        self.parallel_limit.unwrap_or(4).max(1) as usize
    }

    pub fn enabled_repositories(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter().filter(|r| r.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const SAMPLE: &str = r#"
        repositories_path = "/var/lib/keel/repos"
        parallel_limit = 2

        [[repositories]]
        name = "main"
        type = "http"
        urls = ["https://mirror-a.example.com", "https://mirror-b.example.com"]
        priority = 1

        [[repositories]]
        name = "extra"
        type = "disk"
        urls = ["/srv/extra"]
        enabled = false
    "#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.parallel_limit(), 2);
        assert_eq!(
            config.get_repositories_path(),
            PathBuf::from("/var/lib/keel/repos")
        );

        let enabled: Vec<_> = config.enabled_repositories().map(|r| &r.name).collect();
        assert_eq!(enabled, vec!["main"]);
    }

    #[test]
    fn test_duplicate_repository_rejected() {
        let content = r#"
            [[repositories]]
            name = "main"
            type = "http"
            urls = ["https://a"]

            [[repositories]]
            name = "main"
            type = "disk"
            urls = ["/b"]
        "#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::DuplicateRepositoryName(name)) if name == "main"
        ));
    }

    #[test]
    fn test_missing_urls_rejected() {
        let content = r#"
            [[repositories]]
            name = "main"
            type = "http"
        "#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::MissingUrls(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let serialized = config.to_toml().unwrap();
        let reparsed = Config::from_toml(&serialized).unwrap();
        assert_eq!(reparsed.repositories, config.repositories);
    }

    #[test]
    #[serial]
    fn test_root_from_env() {
        let old = std::env::var("KEEL_ROOT").ok();
        std::env::set_var("KEEL_ROOT", "/opt/keel");

        let config = Config::default();
        assert_eq!(config.get_root_path(), PathBuf::from("/opt/keel"));
        assert_eq!(
            config.get_repositories_path(),
            PathBuf::from("/opt/keel/repos")
        );

        match old {
            Some(v) => std::env::set_var("KEEL_ROOT", v),
            None => std::env::remove_var("KEEL_ROOT"),
        }
    }
}
