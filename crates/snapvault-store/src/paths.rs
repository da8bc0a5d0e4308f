//! On-disk layout of a snapvault store.
//!
//! ```text
//! <root>/
//!   versions.db
//!   collections/<name>/
//!     LOCK
//!     catalog.db
//!     archives/<snapshot_id>.tar.gz
//! ```

#![allow(clippy::result_large_err)]

use crate::errors::{io_error_at, validation, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Resolves every path under a store root
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_db(&self) -> PathBuf {
        self.root.join("versions.db")
    }

    pub fn collections_dir(&self) -> PathBuf {
        self.root.join("collections")
    }

    /// Directory of one collection; the name is validated first.
    pub fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self.collections_dir().join(collection))
    }

    pub fn lock_file(&self, collection: &str) -> Result<PathBuf> {
        Ok(self.collection_dir(collection)?.join("LOCK"))
    }

    pub fn catalog_db(&self, collection: &str) -> Result<PathBuf> {
        Ok(self.collection_dir(collection)?.join("catalog.db"))
    }

    pub fn archives_dir(&self, collection: &str) -> Result<PathBuf> {
        Ok(self.collection_dir(collection)?.join("archives"))
    }

    pub fn archive_file(&self, collection: &str, snapshot_id: &str) -> Result<PathBuf> {
        Ok(self
            .archives_dir(collection)?
            .join(format!("{}.{}", snapshot_id, ARCHIVE_EXTENSION)))
    }

    /// Create the collection directory and its archive directory
    pub fn ensure_collection(&self, collection: &str) -> Result<PathBuf> {
        let archives = self.archives_dir(collection)?;
        fs::create_dir_all(&archives).map_err(|e| io_error_at("ensure_collection", &archives, e))?;
        self.collection_dir(collection)
    }
}

/// Snapshot id encoded in an archive file name, if it is one
pub fn snapshot_id_from_archive(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(&format!(".{}", ARCHIVE_EXTENSION))
        .map(str::to_string)
}

/// Collection names become directory names: `[A-Za-z0-9._-]+`, not `.` or `..`
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if name.is_empty() || !valid_chars || name == "." || name == ".." {
        return Err(
            validation("validate_collection_name", format!("invalid collection name '{}'", name))
                .with_collection(name),
        );
    }
    Ok(())
}
