//! Version catalog derived from the firmware artifact directory.
//!
//! The set of available versions is exactly the set of version-named files
//! in the jar directory; there is no separate index to drift out of sync.

use std::path::{Path, PathBuf};

use otap_core::version::{Selector, parse_version};
use semver::Version;
use thiserror::Error;

/// Extension carried by stored firmware artifacts.
pub const JAR_EXT: &str = "jar";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised both for stored filenames (a data-integrity fault, not
    /// something to skip: it would corrupt the ordering every selector
    /// depends on) and for operator-supplied exact selectors.
    #[error("`{0}` does not parse as a semantic version")]
    MalformedVersion(String),

    #[error("no versions available")]
    NoVersionsAvailable,

    #[error("version `{0}` not found")]
    NotFound(String),
}

/// Read-only view over the artifact directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    jar_dir: PathBuf,
}

impl Catalog {
    pub const fn new(jar_dir: PathBuf) -> Self {
        Self { jar_dir }
    }

    pub fn jar_dir(&self) -> &Path {
        &self.jar_dir
    }

    /// Path an artifact for `version` lives at, by naming convention.
    pub fn jar_path(&self, version: &str) -> PathBuf {
        self.jar_dir.join(format!("{version}.{JAR_EXT}"))
    }

    /// All stored versions in ascending semantic order.
    ///
    /// Hidden files (leading `.`) are excluded; a directory that does not
    /// exist yet is an empty catalog, not an error.
    pub fn list_versions(&self) -> Result<Vec<Version>, CatalogError> {
        let mut versions = Vec::new();
        if !self.jar_dir.exists() {
            return Ok(versions);
        }

        for entry in std::fs::read_dir(&self.jar_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let stem = name
                .strip_suffix(&format!(".{JAR_EXT}"))
                .unwrap_or(name.as_ref());
            let version = parse_version(stem)
                .map_err(|_| CatalogError::MalformedVersion(name.into_owned()))?;
            versions.push(version);
        }

        versions.sort();
        Ok(versions)
    }

    /// The current catalog maximum.
    pub fn latest(&self) -> Result<Version, CatalogError> {
        self.list_versions()?
            .pop()
            .ok_or(CatalogError::NoVersionsAvailable)
    }

    /// Resolve an operator-supplied selector to a version string.
    ///
    /// `latest` resolves to the current maximum, once. `*` is passed through
    /// unresolved: it is a live selector re-evaluated at every delivery.
    /// Anything else must exist in the catalog.
    pub fn resolve(&self, raw: &str) -> Result<String, CatalogError> {
        match Selector::parse(raw) {
            Selector::Latest => Ok(self.latest()?.to_string()),
            Selector::Wildcard => Ok(raw.to_string()),
            Selector::Exact(v) => {
                let wanted =
                    parse_version(&v).map_err(|_| CatalogError::MalformedVersion(v.clone()))?;
                if self.list_versions()?.contains(&wanted) {
                    Ok(v)
                } else {
                    Err(CatalogError::NotFound(v))
                }
            }
        }
    }
}
