use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Priority assigned to repositories that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 99;

/// A repository entry as authored in the configuration file.
///
/// The values here are authoritative for a client: after a sync, the urls,
/// authentication, type, priority, name and verify flag advertised by the
/// remote repository are replaced with the ones configured locally.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Repository {
    /// Unique name of the repository.
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// Ordered list of mirrors. The first reachable one is used.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Transport kind: `disk`, `http` or `registry` (alias `docker`).
    #[serde(rename = "type")]
    pub repo_type: String,

    /// Lower values take precedence when the same package is offered by
    /// several repositories.
    /// Default: 99
    pub priority: Option<i32>,

    /// Whether the repository is enabled.
    /// Default: true
    pub enabled: Option<bool>,

    /// Whether integrity checks are mandatory.
    /// Default: false
    pub verify: Option<bool>,

    /// Persist the synced repository in the local cache.
    /// Default: true
    pub cached: Option<bool>,

    /// Opaque credentials handed to the transport (`username`/`password`,
    /// or `token`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub authentication: HashMap<String, String>,
}

impl Repository {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn verify(&self) -> bool {
        self.verify.unwrap_or(false)
    }

    pub fn is_cached(&self) -> bool {
        self.cached.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_defaults() {
        let repo: Repository = toml::from_str(
            r#"
            name = "main"
            type = "http"
            urls = ["https://example.com/repo"]
            "#,
        )
        .unwrap();

        assert!(repo.is_enabled());
        assert!(repo.is_cached());
        assert!(!repo.verify());
        assert_eq!(repo.priority(), DEFAULT_PRIORITY);
        assert!(repo.authentication.is_empty());
    }

    #[test]
    fn test_repository_authentication() {
        let repo: Repository = toml::from_str(
            r#"
            name = "private"
            type = "registry"
            urls = ["quay.io/org/repo"]
            priority = 1

            [authentication]
            username = "bot"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(repo.priority(), 1);
        assert_eq!(repo.repo_type, "registry");
        assert_eq!(repo.authentication.get("username").unwrap(), "bot");
    }
}
