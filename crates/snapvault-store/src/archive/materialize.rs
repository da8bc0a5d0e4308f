//! Writing single tree entries into a live directory.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error_at, validation, Result};
use snapvault_core::tree::{EntryKind, TreeEntry};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Write one entry at `root/rel`, replacing whatever is there.
///
/// A non-directory in the way of a directory, or any existing entry in the
/// way of a file or symlink, is removed first. Parent directories are created.
pub fn materialize_entry(root: &Path, rel: &str, entry: &TreeEntry) -> Result<()> {
    let path = join_relative(root, rel)?;
    let existing = fs::symlink_metadata(&path).ok();

    match entry.kind {
        EntryKind::Dir => {
            if existing.as_ref().is_some_and(|m| !m.is_dir()) {
                fs::remove_file(&path).map_err(|e| io_error_at("materialize", &path, e))?;
            }
            fs::create_dir_all(&path).map_err(|e| io_error_at("materialize", &path, e))?;
        }
        EntryKind::File | EntryKind::Symlink => {
            if let Some(meta) = existing {
                remove_path(&path, meta.is_dir())?;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error_at("materialize", parent, e))?;
            }
            if entry.kind == EntryKind::File {
                fs::write(&path, &entry.content).map_err(|e| io_error_at("materialize", &path, e))?;
                set_mode(&path, entry.mode)?;
            } else {
                let target = String::from_utf8_lossy(&entry.content).into_owned();
                make_symlink(&target, &path)?;
            }
        }
    }
    Ok(())
}

/// Remove a file or symlink at `root/rel`; missing paths are not an error.
pub fn remove_leaf(root: &Path, rel: &str) -> Result<()> {
    let path = join_relative(root, rel)?;
    match fs::symlink_metadata(&path) {
        Ok(meta) => remove_path(&path, meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error_at("remove_leaf", &path, e)),
    }
}

fn remove_path(path: &Path, is_dir: bool) -> Result<()> {
    let removed = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| io_error_at("materialize", path, e))
}

/// Resolve `rel` under `root`, refusing traversal and symlinked ancestors.
///
/// Writes follow symlinked parent directories, so a link anywhere above the
/// leaf would let a restore land outside `root`.
fn join_relative(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let safe = !rel.is_empty()
        && rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(validation("materialize", format!("unsafe relative path '{}'", rel)));
    }

    let mut ancestor = root.to_path_buf();
    let mut parts = rel_path.components().peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            break;
        }
        ancestor.push(part);
        match fs::symlink_metadata(&ancestor) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(validation(
                    "materialize",
                    format!("'{}' lies below symlink '{}'", rel, ancestor.display()),
                )
                .with_entity_id(rel));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => break,
            Err(e) => return Err(io_error_at("materialize", &ancestor, e)),
        }
    }
    Ok(root.join(rel_path))
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|e| io_error_at("materialize", path, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path).map_err(|e| io_error_at("materialize", path, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, path: &Path) -> Result<()> {
    Err(io_error_at(
        "materialize",
        path,
        std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks need a unix host"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_replaces_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("x/inner")).unwrap();
        materialize_entry(dir.path(), "x", &TreeEntry::file(b"now a file".to_vec())).unwrap();
        assert_eq!(fs::read(dir.path().join("x")).unwrap(), b"now a file");
    }

    #[test]
    fn test_directory_replaces_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x"), "file").unwrap();
        materialize_entry(dir.path(), "x", &TreeEntry::dir()).unwrap();
        assert!(dir.path().join("x").is_dir());
    }

    #[test]
    fn test_creates_parents() {
        let dir = TempDir::new().unwrap();
        materialize_entry(dir.path(), "a/b/c.txt", &TreeEntry::file(b"c".to_vec())).unwrap();
        assert_eq!(fs::read(dir.path().join("a/b/c.txt")).unwrap(), b"c");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        assert!(materialize_entry(dir.path(), "../out", &TreeEntry::file(vec![])).is_err());
        assert!(remove_leaf(dir.path(), "/abs").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_replaces_file_without_following() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real"), "real").unwrap();
        fs::write(dir.path().join("link"), "was a file").unwrap();
        materialize_entry(dir.path(), "link", &TreeEntry::symlink("real")).unwrap();
        assert_eq!(
            fs::read_link(dir.path().join("link")).unwrap(),
            Path::new("real")
        );
        assert_eq!(fs::read(dir.path().join("real")).unwrap(), b"real");
    }

    #[cfg(unix)]
    #[test]
    fn test_refuses_writes_below_symlinked_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("docs")).unwrap();

        let err = materialize_entry(&root, "docs/readme.md", &TreeEntry::file(b"x".to_vec()))
            .unwrap_err();
        assert_eq!(err.kind(), snapvault_core::errors::ExErrorKind::Validation);
        assert!(!outside.join("readme.md").exists());
        assert!(remove_leaf(&root, "docs/readme.md").is_err());

        // Replacing the link itself is still allowed
        materialize_entry(&root, "docs", &TreeEntry::dir()).unwrap();
        assert!(fs::symlink_metadata(root.join("docs")).unwrap().is_dir());
        materialize_entry(&root, "docs/readme.md", &TreeEntry::file(b"x".to_vec())).unwrap();
        assert!(!outside.join("readme.md").exists());
    }
}
