//! Lenient version parsing and version selectors.
//!
//! Package versions are not strictly semver: `1.0`, `2` and `1.2.3-r1` are
//! all common. They are normalized by padding the numeric core to three
//! components and moving any suffix into build metadata, so ordering follows
//! the numeric core first and the suffix second. Selectors are translated into
//! [`semver::VersionReq`] comparators.

use std::cmp::Ordering;

use semver::{Version, VersionReq};

use crate::error::{PackageError, Result};

const SELECTOR_PREFIXES: [char; 6] = ['<', '>', '=', '~', '^', '!'];

/// Parses a package version, returning `None` if it has no numeric core.
pub fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let (core, suffix) = match raw.find(['-', '+']) {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    let mut normalized = parts.join(".");
    if let Some(suffix) = suffix {
        let build = suffix
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(".");
        if !build.is_empty() {
            normalized.push('+');
            normalized.push_str(&build);
        }
    }

    Version::parse(&normalized).ok()
}

/// Orders two raw versions. Unparseable versions sort before parseable ones
/// and fall back to a plain string comparison among themselves.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Whether a version string denotes a range rather than one exact version.
pub fn is_selector(version: &str) -> bool {
    let version = version.trim();
    version.is_empty()
        || version.starts_with(SELECTOR_PREFIXES)
        || version.contains('*')
        || version.contains(',')
        || version.contains(' ')
}

/// A parsed version range such as `>=1.0, <2.0`.
#[derive(Debug, Clone)]
pub struct VersionSelector {
    raw: String,
    req: VersionReq,
}

impl VersionSelector {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self {
                raw: raw.to_string(),
                req: VersionReq::STAR,
            });
        }

        let comparators = trimmed
            .split([',', ' '])
            .filter(|c| !c.is_empty())
            .map(|c| {
                normalize_comparator(c).ok_or_else(|| PackageError::InvalidSelector(raw.into()))
            })
            .collect::<Result<Vec<_>>>()?;

        let req = VersionReq::parse(&comparators.join(", "))
            .map_err(|_| PackageError::InvalidSelector(raw.into()))?;

        Ok(Self {
            raw: raw.to_string(),
            req,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a concrete version satisfies this selector.
    pub fn matches(&self, version: &str) -> bool {
        match parse_version(version) {
            Some(mut parsed) => {
                // Requirements never carry build metadata.
                parsed.build = semver::BuildMetadata::EMPTY;
                self.req.matches(&parsed)
            }
            None => self.req == VersionReq::STAR,
        }
    }
}

fn normalize_comparator(comparator: &str) -> Option<String> {
    let split = comparator
        .find(|c: char| !SELECTOR_PREFIXES.contains(&c))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);

    if op.contains('!') {
        return None;
    }
    if version.contains('*') || version.contains('x') {
        return Some(comparator.to_string());
    }

    let parsed = parse_version(version)?;
    let op = if op.is_empty() { "=" } else { op };
    Some(format!("{op}{}.{}.{}", parsed.major, parsed.minor, parsed.patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_pads_core() {
        assert_eq!(parse_version("1.0").unwrap(), Version::new(1, 0, 0));
        assert_eq!(parse_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(parse_version("abc").is_none());
        assert!(parse_version("1.2.3.4").is_none());
        assert!(parse_version("").is_none());
    }

    #[test]
    fn test_parse_version_keeps_suffix_as_build() {
        let v = parse_version("1.0-r1").unwrap();
        assert_eq!(v.build.as_str(), "r1");
        let v = parse_version("1.0+2").unwrap();
        assert_eq!(v.build.as_str(), "2");
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.0-r2", "1.0-r1"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("git", "0.1"), Ordering::Less);
    }

    #[test]
    fn test_is_selector() {
        assert!(is_selector(">=1.0"));
        assert!(is_selector("<2"));
        assert!(is_selector("*"));
        assert!(is_selector(""));
        assert!(is_selector(">=1.0 <2.0"));
        assert!(!is_selector("1.0"));
        assert!(!is_selector("1.0-r1"));
    }

    #[test]
    fn test_selector_matching() {
        let sel = VersionSelector::parse(">=1.0, <2.0").unwrap();
        assert!(sel.matches("1.0"));
        assert!(sel.matches("1.5-r3"));
        assert!(!sel.matches("2.0"));
        assert!(!sel.matches("0.9"));

        let sel = VersionSelector::parse(">=1.0 <2.0").unwrap();
        assert!(sel.matches("1.9.9"));

        let any = VersionSelector::parse("*").unwrap();
        assert!(any.matches("whatever"));
        assert!(any.matches("3.1"));
    }

    #[test]
    fn test_exact_selector() {
        let sel = VersionSelector::parse("=1.2").unwrap();
        assert!(sel.matches("1.2"));
        assert!(sel.matches("1.2.0"));
        assert!(!sel.matches("1.2.1"));
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(
            VersionSelector::parse("!=1.0"),
            Err(PackageError::InvalidSelector(_))
        ));
        assert!(VersionSelector::parse(">=banana").is_err());
    }
}
