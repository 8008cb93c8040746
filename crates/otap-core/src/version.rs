//! Semantic-version parsing and delivery selectors.
//!
//! Firmware versions are ordered by numeric segment comparison
//! (`0.9.2 < 0.10.0`), never lexically. A delivery target is assigned
//! through a [`Selector`]: an exact version, `latest` (resolved once, when
//! the operator issues the command), or `*` (re-resolved against the
//! catalog at every delivery).

use std::fmt;

use semver::Version;
use thiserror::Error;

/// The live always-latest selector, re-evaluated at each delivery.
pub const WILDCARD: &str = "*";

/// The resolve-once selector accepted by the `deliver` command.
pub const LATEST: &str = "latest";

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("malformed version `{0}`")]
    Malformed(String),
}

/// Parse a `major.minor.patch` version string.
pub fn parse_version(s: &str) -> Result<Version, VersionError> {
    Version::parse(s).map_err(|_| VersionError::Malformed(s.to_string()))
}

/// A version selector as supplied by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Resolve to the current catalog maximum, once.
    Latest,
    /// Stay on the catalog maximum forever (`*`).
    Wildcard,
    /// A concrete version string.
    Exact(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        match raw {
            LATEST => Self::Latest,
            WILDCARD => Self::Wildcard,
            other => Self::Exact(other.to_string()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "{LATEST}"),
            Self::Wildcard => write!(f, "{WILDCARD}"),
            Self::Exact(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segment_ordering() {
        let a = parse_version("0.9.2").unwrap();
        let b = parse_version("0.10.0").unwrap();
        assert!(a < b, "0.9.2 must sort before 0.10.0");
    }

    #[test]
    fn lexical_ordering_would_be_wrong() {
        // The string comparison goes the other way; make sure we never
        // fall back to it.
        assert!("0.10.0" < "0.9.2");
        let a = parse_version("0.10.0").unwrap();
        let b = parse_version("0.9.2").unwrap();
        assert!(a > b);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_version("not-a-version").is_err());
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn selector_parse_roundtrip() {
        assert_eq!(Selector::parse("latest"), Selector::Latest);
        assert_eq!(Selector::parse("*"), Selector::Wildcard);
        assert_eq!(
            Selector::parse("1.2.0"),
            Selector::Exact("1.2.0".to_string())
        );
        assert_eq!(Selector::parse("*").to_string(), "*");
        assert_eq!(Selector::parse("1.2.0").to_string(), "1.2.0");
    }
}
