//! Write-to-temp-then-rename, so readers never see a partial file.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error_at, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `target_path` with `content` in one rename.
///
/// The bytes go to a hidden, uniquely named sibling that is synced before
/// the rename. Missing parent directories are created.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error_at("create_parent_dir", parent, e))?;
    }

    let temp_path = temp_sibling(target_path);
    let written = write_synced(&temp_path, content);
    if let Err(e) = written {
        fs::remove_file(&temp_path).ok();
        return Err(io_error_at("write_temp", &temp_path, e));
    }

    fs::rename(&temp_path, target_path).map_err(|e| {
        fs::remove_file(&temp_path).ok();
        io_error_at("rename_temp", target_path, e)
    })?;

    Ok(())
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// True for leftovers of an interrupted `atomic_write`
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.ends_with(".tmp"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_lands_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("archives").join("20240101T000000.000000Z.tar.gz");

        atomic_write(&archive, b"gz bytes").unwrap();

        assert_eq!(fs::read(&archive).unwrap(), b"gz bytes");
    }

    #[test]
    fn test_overwrite_leaves_no_temp_siblings() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("SKILL.md");
        fs::write(&target, b"old").unwrap();

        atomic_write(&target, b"new").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_file(&e.path()))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_temp_name_is_hidden_sibling() {
        let temp = temp_sibling(Path::new("/live/pdf/SKILL.md"));
        assert_eq!(temp.parent(), Some(Path::new("/live/pdf")));
        assert!(is_temp_file(&temp));
        assert!(!is_temp_file(Path::new("/live/pdf/SKILL.md")));
    }
}
