use std::{collections::BTreeMap, fmt};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    version::{is_selector, VersionSelector},
};

/// A package as declared by a tree definition.
///
/// A package whose version is a range (`>=1.0`, `*`, empty) is a *selector*:
/// it names a set of candidates instead of a single build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Package>,
}

impl Package {
    pub fn new(name: &str, category: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Identity key used to deduplicate packages across repositories.
    pub fn fingerprint(&self) -> String {
        format!("{}-{}-{}", self.name, self.category, self.version)
    }

    /// Name of the final image built for this package.
    pub fn image_id(&self) -> String {
        format!("{}-{}-{}", self.category, self.name, self.version).replace('+', "-")
    }

    pub fn human_readable(&self) -> String {
        if self.category.is_empty() {
            format!("{}-{}", self.name, self.version)
        } else {
            format!("{}/{}-{}", self.category, self.name, self.version)
        }
    }

    pub fn is_selector(&self) -> bool {
        is_selector(&self.version)
    }

    pub fn selector(&self) -> Result<VersionSelector> {
        VersionSelector::parse(&self.version)
    }

    /// Same name and category, regardless of version.
    pub fn same_atom(&self, other: &Package) -> bool {
        self.name == other.name && self.category == other.category
    }

    /// Exact identity match.
    pub fn matches(&self, other: &Package) -> bool {
        self.same_atom(other) && self.version == other.version
    }

    /// Whether this package satisfies `request`, which may be a selector.
    pub fn satisfies(&self, request: &Package) -> bool {
        if !self.same_atom(request) {
            return false;
        }
        if !request.is_selector() {
            return self.version == request.version;
        }
        request
            .selector()
            .map(|sel| sel.matches(&self.version))
            .unwrap_or(false)
    }

    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    /// Matches `key=value` renderings of every label against `re`.
    pub fn match_label(&self, re: &Regex) -> bool {
        self.labels
            .iter()
            .any(|(k, v)| re.is_match(&format!("{k}={v}")))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_strings() {
        let pkg = Package::new("curl", "net", "8.1+1");
        assert_eq!(pkg.fingerprint(), "curl-net-8.1+1");
        assert_eq!(pkg.image_id(), "net-curl-8.1-1");
        assert_eq!(pkg.human_readable(), "net/curl-8.1+1");
        assert_eq!(Package::new("curl", "", "8.1").to_string(), "curl-8.1");
    }

    #[test]
    fn test_satisfies() {
        let pkg = Package::new("curl", "net", "8.1");
        assert!(pkg.satisfies(&Package::new("curl", "net", ">=8.0")));
        assert!(pkg.satisfies(&Package::new("curl", "net", "8.1")));
        assert!(pkg.satisfies(&Package::new("curl", "net", "")));
        assert!(!pkg.satisfies(&Package::new("curl", "net", "<8.0")));
        assert!(!pkg.satisfies(&Package::new("curl", "other", "8.1")));
    }

    #[test]
    fn test_labels() {
        let mut pkg = Package::new("curl", "net", "8.1");
        pkg.labels.insert("origin".into(), "upstream".into());

        assert!(pkg.has_label("origin"));
        assert!(!pkg.has_label("arch"));
        assert!(pkg.match_label(&Regex::new("^origin=up").unwrap()));
        assert!(!pkg.match_label(&Regex::new("arch=").unwrap()));
    }

    #[test]
    fn test_definition_toml() {
        let pkg: Package = toml::from_str(
            r#"
            name = "curl"
            category = "net"
            version = "8.1"

            [labels]
            origin = "upstream"

            [[requires]]
            name = "openssl"
            category = "libs"
            version = ">=3"
            "#,
        )
        .unwrap();

        assert_eq!(pkg.requires.len(), 1);
        assert!(pkg.requires[0].is_selector());

        let back: Package = toml::from_str(&toml::to_string(&pkg).unwrap()).unwrap();
        assert_eq!(back, pkg);
    }
}
