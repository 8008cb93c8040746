//! Firmware artifact storage.
//!
//! Artifacts are identified solely by the semantic version embedded in
//! their JAR manifest; the uploader's filename is never trusted. Stored
//! files are always named `<version>.jar`.

use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use otap_core::version::parse_version;

use crate::catalog::{Catalog, CatalogError};
use crate::storage::Database;

/// Manifest entry holding the embedded version.
const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Key prefix of the manifest line carrying the version.
const VERSION_KEY: &str = "MIDlet-Version: ";

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Upload rejection: the payload is not a readable archive, the
    /// manifest entry is absent, or the version line is missing.
    #[error("cannot extract version from artifact: {0}")]
    VersionExtraction(String),

    #[error("artifact for version `{0}` already exists")]
    ArtifactExists(String),

    #[error("version `{version}` is the delivery target of {count} device(s)")]
    VersionInUse { version: String, count: i64 },

    #[error("no stored artifact for version `{0}`")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Read the embedded version out of a JAR payload.
pub fn extract_version(bytes: &[u8]) -> Result<String, ArtifactError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ArtifactError::VersionExtraction(format!("not a valid archive: {e}")))?;

    let mut entry = archive
        .by_name(MANIFEST_PATH)
        .map_err(|_| ArtifactError::VersionExtraction(format!("{MANIFEST_PATH} entry missing")))?;

    let mut raw = Vec::new();
    entry
        .read_to_end(&mut raw)
        .map_err(|e| ArtifactError::VersionExtraction(format!("manifest unreadable: {e}")))?;

    let manifest = String::from_utf8_lossy(&raw);
    for line in manifest.lines() {
        if let Some(value) = line.trim_end().strip_prefix(VERSION_KEY) {
            return Ok(value.trim().to_string());
        }
    }

    Err(ArtifactError::VersionExtraction(format!(
        "no `{}` line in manifest",
        VERSION_KEY.trim_end()
    )))
}

/// Content-addressed-by-version firmware store over a flat directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    catalog: Catalog,
}

impl ArtifactStore {
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Store an uploaded artifact under its embedded version.
    ///
    /// The file is written to a temporary name in the jar directory and
    /// renamed into place, so a purge racing this upload leaves either the
    /// old or the new artifact, never a torn file.
    pub fn store(
        &self,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<(String, PathBuf), ArtifactError> {
        let version = extract_version(bytes)?;
        parse_version(&version).map_err(|_| {
            ArtifactError::VersionExtraction(format!(
                "embedded version `{version}` is not a valid semantic version"
            ))
        })?;

        let dir = self.catalog.jar_dir();
        std::fs::create_dir_all(dir)?;

        let path = self.catalog.jar_path(&version);
        if path.exists() && !overwrite {
            return Err(ArtifactError::ArtifactExists(version));
        }

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| ArtifactError::Io(e.error))?;

        info!(version = %version, path = %path.display(), "Artifact stored");
        Ok((version, path))
    }

    /// Delete a stored artifact.
    ///
    /// Refuses while any device's delivery target resolves to this exact
    /// version at call time (devices on `*` count when the version is the
    /// current catalog maximum).
    pub async fn purge(&self, db: &Database, version: &str) -> Result<(), ArtifactError> {
        let mut in_use = db
            .count_targeting(version)
            .await
            .map_err(|e| ArtifactError::Storage(e.to_string()))?;

        if let Ok(latest) = self.catalog.latest() {
            if latest.to_string() == version {
                in_use += db
                    .count_wildcard()
                    .await
                    .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            }
        }

        if in_use > 0 {
            return Err(ArtifactError::VersionInUse {
                version: version.to_string(),
                count: in_use,
            });
        }

        let path = self.catalog.jar_path(version);
        if !path.exists() {
            return Err(ArtifactError::NotFound(version.to_string()));
        }
        std::fs::remove_file(&path)?;

        info!(version = %version, "Artifact purged");
        Ok(())
    }

    /// Byte size of a stored artifact (descriptor responses).
    pub fn size_of(&self, version: &str) -> Result<u64, ArtifactError> {
        let path = self.catalog.jar_path(version);
        let meta = std::fs::metadata(&path)
            .map_err(|_| ArtifactError::NotFound(version.to_string()))?;
        Ok(meta.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jar_with_version(version: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        let mut zw = zip::ZipWriter::new(&mut buf);
        zw.start_file(
            MANIFEST_PATH,
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        write!(
            zw,
            "Manifest-Version: 1.0\r\nMIDlet-Name: OwnTracks\r\nMIDlet-Version: {version}\r\n"
        )
        .unwrap();
        zw.finish().unwrap();
        buf.into_inner()
    }

    fn test_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(Catalog::new(dir.path().to_path_buf()));
        (dir, store)
    }

    #[test]
    fn extracts_manifest_version() {
        let jar = jar_with_version("0.8.37");
        assert_eq!(extract_version(&jar).unwrap(), "0.8.37");
    }

    #[test]
    fn rejects_non_archive() {
        assert!(matches!(
            extract_version(b"definitely not a zip"),
            Err(ArtifactError::VersionExtraction(_))
        ));
    }

    #[test]
    fn rejects_manifest_without_version_line() {
        let mut buf = Cursor::new(Vec::new());
        let mut zw = zip::ZipWriter::new(&mut buf);
        zw.start_file(MANIFEST_PATH, zip::write::SimpleFileOptions::default())
            .unwrap();
        write!(zw, "Manifest-Version: 1.0\r\n").unwrap();
        zw.finish().unwrap();
        assert!(matches!(
            extract_version(&buf.into_inner()),
            Err(ArtifactError::VersionExtraction(_))
        ));
    }

    #[test]
    fn stores_under_extracted_version() {
        let (dir, store) = test_store();
        let (version, path) = store.store(&jar_with_version("1.2.0"), false).unwrap();
        assert_eq!(version, "1.2.0");
        assert_eq!(path, dir.path().join("1.2.0.jar"));
        assert!(path.exists());
    }

    #[test]
    fn refuses_overwrite_unless_requested() {
        let (_dir, store) = test_store();
        store.store(&jar_with_version("1.2.0"), false).unwrap();
        assert!(matches!(
            store.store(&jar_with_version("1.2.0"), false),
            Err(ArtifactError::ArtifactExists(_))
        ));
        assert!(store.store(&jar_with_version("1.2.0"), true).is_ok());
    }

    #[test]
    fn rejects_non_semver_embedded_version() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.store(&jar_with_version("banana"), false),
            Err(ArtifactError::VersionExtraction(_))
        ));
    }

    #[test]
    fn size_of_missing_version_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.size_of("9.9.9"),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn purge_refuses_while_targeted() {
        let (_dir, store) = test_store();
        let db = Database::open_in_memory().await.unwrap();
        store.store(&jar_with_version("1.2.0"), false).unwrap();

        db.upsert_device("123456789012345", "ACME", Some("PM"))
            .await
            .unwrap();
        db.set_deliver("123456789012345", Some("1.2.0")).await.unwrap();

        let err = store.purge(&db, "1.2.0").await.unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::VersionInUse { count: 1, .. }
        ));

        // Retargeting the device away frees the version for purging.
        db.set_deliver("123456789012345", Some("1.3.0")).await.unwrap();
        store.purge(&db, "1.2.0").await.unwrap();
        assert!(!store.catalog().jar_path("1.2.0").exists());
    }

    #[tokio::test]
    async fn purge_counts_wildcard_devices_on_latest() {
        let (_dir, store) = test_store();
        let db = Database::open_in_memory().await.unwrap();
        store.store(&jar_with_version("1.0.0"), false).unwrap();
        store.store(&jar_with_version("2.0.0"), false).unwrap();

        db.upsert_device("123456789012345", "ACME", None)
            .await
            .unwrap();
        db.set_deliver("123456789012345", Some("*")).await.unwrap();

        // The wildcard device currently resolves to 2.0.0; 1.0.0 is free.
        assert!(store.purge(&db, "1.0.0").await.is_ok());
        assert!(matches!(
            store.purge(&db, "2.0.0").await,
            Err(ArtifactError::VersionInUse { .. })
        ));
    }

    #[tokio::test]
    async fn purge_unknown_version_is_not_found() {
        let (_dir, store) = test_store();
        let db = Database::open_in_memory().await.unwrap();
        assert!(matches!(
            store.purge(&db, "3.1.4").await,
            Err(ArtifactError::NotFound(_))
        ));
    }
}
