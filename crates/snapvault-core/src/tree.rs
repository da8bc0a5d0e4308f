//! In-memory view of a directory tree.
//!
//! The merge engine compares three trees (base, local, target). Trees are
//! read either from a live directory or from a decoded snapshot archive,
//! keyed by `/`-separated relative path.

use crate::errors::{Result, VaultError};
use crate::hash::{relative_key, sha256_hex, tree_digest, ContentHash, ManifestKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_LEN: usize = 8000;

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Symlink,
    Dir,
}

/// One node of a tree.
///
/// For files `content` is the file bytes, for symlinks the link target;
/// directories carry no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub content: Vec<u8>,
    pub hash: ContentHash,
    pub mode: Option<u32>,
}

impl TreeEntry {
    pub fn file(content: Vec<u8>) -> Self {
        let hash = ContentHash::from_hex(sha256_hex(&content));
        Self {
            kind: EntryKind::File,
            content,
            hash,
            mode: None,
        }
    }

    pub fn symlink(target: &str) -> Self {
        Self {
            kind: EntryKind::Symlink,
            content: target.as_bytes().to_vec(),
            hash: ContentHash::from_hex(sha256_hex(target.as_bytes())),
            mode: None,
        }
    }

    pub fn dir() -> Self {
        Self {
            kind: EntryKind::Dir,
            content: Vec::new(),
            hash: ContentHash::from_hex(String::new()),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Same kind and same bytes
    pub fn same_content(&self, other: &TreeEntry) -> bool {
        self.kind == other.kind && self.hash == other.hash
    }

    /// NUL byte in the leading window, or not valid UTF-8
    pub fn is_binary(&self) -> bool {
        if self.kind != EntryKind::File {
            return false;
        }
        let window = &self.content[..self.content.len().min(BINARY_SNIFF_LEN)];
        window.contains(&0) || std::str::from_utf8(&self.content).is_err()
    }

    /// Content as text, `None` for binary files, symlinks and directories
    pub fn text(&self) -> Option<String> {
        if self.kind != EntryKind::File || self.is_binary() {
            return None;
        }
        String::from_utf8(self.content.clone()).ok()
    }
}

/// Sorted map of relative path to entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    entries: BTreeMap<String, TreeEntry>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a live directory. Symlinks are recorded, never followed.
    ///
    /// # Errors
    ///
    /// `VaultError::CollectionNotFound` if `root` is missing,
    /// `VaultError::Io` on any unreadable descendant.
    pub fn from_dir(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(VaultError::CollectionNotFound {
                path: root.display().to_string(),
            });
        }
        let mut tree = Self::new();
        for entry in walkdir::WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| VaultError::Io {
                op: "read_tree".to_string(),
                path: root.display().to_string(),
                message: e.to_string(),
            })?;
            let rel = relative_key(root, entry.path())?;
            let file_type = entry.file_type();
            if file_type.is_symlink() {
                let target = fs::read_link(entry.path())
                    .map_err(|e| VaultError::io("read_tree", entry.path(), e))?;
                tree.insert(rel, TreeEntry::symlink(&target.to_string_lossy()));
            } else if file_type.is_dir() {
                tree.insert(rel, TreeEntry::dir());
            } else {
                let bytes =
                    fs::read(entry.path()).map_err(|e| VaultError::io("read_tree", entry.path(), e))?;
                let mut node = TreeEntry::file(bytes);
                if let Some(mode) = file_mode(entry.path()) {
                    node = node.with_mode(mode);
                }
                tree.insert(rel, node);
            }
        }
        Ok(tree)
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: TreeEntry) {
        self.entries.insert(path.into(), entry);
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    /// Files and symlinks only, in path order
    pub fn leaves(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter().filter(|(_, e)| e.kind != EntryKind::Dir)
    }

    /// Number of distinct top-level names (one per artifact)
    pub fn top_level_count(&self) -> usize {
        self.entries
            .keys()
            .map(|k| k.split('/').next().unwrap_or(k))
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }

    /// Tree digest, identical to `ContentHasher::hash` of the same directory
    pub fn content_hash(&self) -> ContentHash {
        let mut rows: Vec<(ManifestKind, String, String)> = self
            .entries
            .iter()
            .map(|(path, entry)| {
                let kind = match entry.kind {
                    EntryKind::File => ManifestKind::File,
                    EntryKind::Symlink => ManifestKind::Symlink,
                    EntryKind::Dir => ManifestKind::Dir,
                };
                (kind, path.clone(), entry.hash.as_str().to_string())
            })
            .collect();
        tree_digest(&mut rows)
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ContentHasher;
    use tempfile::TempDir;

    #[test]
    fn tree_hash_matches_directory_hash() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/empty")).unwrap();
        fs::write(dir.path().join("a/x.txt"), "x").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();

        let tree = FileTree::from_dir(dir.path()).unwrap();
        let hashed = ContentHasher::new().hash(dir.path()).unwrap();
        assert_eq!(tree.content_hash(), hashed);
    }

    #[test]
    fn top_level_count_groups_nested_paths() {
        let mut tree = FileTree::new();
        tree.insert("skill-a", TreeEntry::dir());
        tree.insert("skill-a/SKILL.md", TreeEntry::file(b"a".to_vec()));
        tree.insert("skill-b.md", TreeEntry::file(b"b".to_vec()));
        assert_eq!(tree.top_level_count(), 2);
    }

    #[test]
    fn binary_detection() {
        assert!(TreeEntry::file(vec![0x89, b'P', b'N', b'G', 0, 1]).is_binary());
        assert!(!TreeEntry::file(b"plain text".to_vec()).is_binary());
        assert!(TreeEntry::file(vec![0xff, 0xfe, 0xfd]).is_binary());
    }

    #[test]
    fn missing_root_is_collection_not_found() {
        let dir = TempDir::new().unwrap();
        let err = FileTree::from_dir(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, VaultError::CollectionNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_recorded_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), "real").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("link")).unwrap();
        let tree = FileTree::from_dir(dir.path()).unwrap();
        let link = tree.get("link").unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
        assert_eq!(link.content, b"real.txt");
    }
}
