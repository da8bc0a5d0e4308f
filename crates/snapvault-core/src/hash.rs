//! Stable content identity for files and directory trees.
//!
//! A file hashes to the SHA-256 of its bytes. A directory hashes to the
//! SHA-256 of a manifest listing every descendant by sorted relative path
//! together with that descendant's own hash, so two trees with the same
//! relative structure and bytes hash identically no matter where they live,
//! when they were touched, or in which order the filesystem lists them.

use crate::errors::{Result, VaultError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Hex-encoded SHA-256 content identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an existing hex digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute SHA256 digest of bytes as lowercase hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Kind tag used in directory manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ManifestKind {
    File,
    Dir,
    Symlink,
}

impl ManifestKind {
    fn tag(self) -> &'static str {
        match self {
            ManifestKind::File => "F",
            ManifestKind::Dir => "D",
            ManifestKind::Symlink => "L",
        }
    }
}

/// Fold `(kind, relative path, hash)` rows into one tree digest.
///
/// Rows are sorted by path before hashing; callers may pass them in any order.
pub(crate) fn tree_digest(rows: &mut [(ManifestKind, String, String)]) -> ContentHash {
    rows.sort_by(|a, b| a.1.cmp(&b.1));
    let mut hasher = Sha256::new();
    for (kind, path, hash) in rows.iter() {
        hasher.update(kind.tag().as_bytes());
        hasher.update([0u8]);
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    ContentHash(hex::encode(hasher.finalize()))
}

/// Computes content identities. Stateless; no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a single file or a whole directory tree.
    ///
    /// Symlinks are hashed by their target path and never followed.
    ///
    /// # Errors
    ///
    /// `VaultError::Io` when the path or any descendant is unreadable.
    pub fn hash(&self, path: &Path) -> Result<ContentHash> {
        let meta = fs::symlink_metadata(path).map_err(|e| VaultError::io("hash", path, e))?;
        if meta.file_type().is_symlink() {
            let target = fs::read_link(path).map_err(|e| VaultError::io("hash", path, e))?;
            return Ok(ContentHash(sha256_hex(
                target.to_string_lossy().as_bytes(),
            )));
        }
        if meta.is_file() {
            return self.hash_file(path);
        }
        self.hash_dir(path)
    }

    /// Hash raw bytes the way a regular file is hashed
    pub fn hash_bytes(&self, bytes: &[u8]) -> ContentHash {
        ContentHash(sha256_hex(bytes))
    }

    fn hash_file(&self, path: &Path) -> Result<ContentHash> {
        let bytes = fs::read(path).map_err(|e| VaultError::io("hash", path, e))?;
        Ok(self.hash_bytes(&bytes))
    }

    fn hash_dir(&self, root: &Path) -> Result<ContentHash> {
        let mut rows = Vec::new();
        for entry in walkdir::WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| VaultError::Io {
                op: "hash".to_string(),
                path: root.display().to_string(),
                message: e.to_string(),
            })?;
            let rel = relative_key(root, entry.path())?;
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                let target = fs::read_link(entry.path())
                    .map_err(|e| VaultError::io("hash", entry.path(), e))?;
                rows.push((
                    ManifestKind::Symlink,
                    rel,
                    sha256_hex(target.to_string_lossy().as_bytes()),
                ));
            } else if file_type.is_dir() {
                rows.push((ManifestKind::Dir, rel, String::new()));
            } else {
                let hash = self.hash_file(entry.path())?;
                rows.push((ManifestKind::File, rel, hash.0));
            }
        }
        Ok(tree_digest(&mut rows))
    }
}

/// Relative path of `path` under `root`, always `/`-separated.
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| VaultError::InvalidPath {
        path: path.display().to_string(),
        reason: format!("not under {}", root.display()),
    })?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
