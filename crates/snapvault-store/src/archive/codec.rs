#![allow(clippy::result_large_err)]

use super::materialize::materialize_entry;
use crate::errors::{archive_corrupt, io_error_at, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use snapvault_core::errors::{ExError, VaultError};
use snapvault_core::hash::relative_key;
use snapvault_core::tree::{EntryKind, FileTree, TreeEntry};
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path};

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;
const LINK_MODE: u32 = 0o777;

/// Encodes directory trees into archive bytes and back
#[derive(Debug, Clone, Copy)]
pub struct ArchiveStore {
    compression_level: u32,
}

impl Default for ArchiveStore {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl ArchiveStore {
    /// `compression_level` is clamped to gzip's 0..=9
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    /// Archive every descendant of `source_dir`.
    ///
    /// # Errors
    ///
    /// `Io` when `source_dir` is missing or anything under it is unreadable.
    pub fn create(&self, source_dir: &Path) -> Result<Vec<u8>> {
        if !source_dir.is_dir() {
            return Err(ExError::from(VaultError::CollectionNotFound {
                path: source_dir.display().to_string(),
            })
            .with_op("archive_create"));
        }

        let encoder = GzEncoder::new(Vec::new(), Compression::new(self.compression_level));
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let walker = walkdir::WalkDir::new(source_dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source_dir).to_path_buf();
                io_error_at("archive_create", &path, e.into())
            })?;
            let rel = relative_key(source_dir, entry.path()).map_err(ExError::from)?;
            let path = entry.path();
            let file_type = entry.file_type();

            let mut header = tar::Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            let appended = if file_type.is_symlink() {
                let target = fs::read_link(path)
                    .map_err(|e| io_error_at("archive_create", path, e))?;
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(LINK_MODE);
                header.set_size(0);
                builder.append_link(&mut header, &rel, &target)
            } else if file_type.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(DIR_MODE);
                header.set_size(0);
                builder.append_data(&mut header, format!("{}/", rel), io::empty())
            } else {
                let bytes = fs::read(path).map_err(|e| io_error_at("archive_create", path, e))?;
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(file_mode(path));
                header.set_size(bytes.len() as u64);
                builder.append_data(&mut header, &rel, bytes.as_slice())
            };
            appended.map_err(|e| io_error_at("archive_create", path, e))?;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| io_error_at("archive_create", source_dir, e))?;
        let bytes = encoder
            .finish()
            .map_err(|e| io_error_at("archive_create", source_dir, e))?;
        tracing::debug!(source = %source_dir.display(), bytes = bytes.len(), "archive encoded");
        Ok(bytes)
    }

    /// Decode archive bytes into `(relative path, entry)` pairs, in archive order.
    ///
    /// # Errors
    ///
    /// `ArchiveCorrupt` on anything but a well-formed archive of files,
    /// directories and symlinks with safe relative paths.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<(String, TreeEntry)>> {
        if bytes.is_empty() {
            return Err(archive_corrupt("empty archive"));
        }
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut decoded = Vec::new();

        for entry in archive.entries().map_err(archive_corrupt)? {
            let mut entry = entry.map_err(archive_corrupt)?;
            let raw_path = entry.path().map_err(archive_corrupt)?.into_owned();
            let rel = safe_relative(&raw_path)?;
            let mode = entry.header().mode().ok();

            let node = match entry.header().entry_type() {
                tar::EntryType::Directory => TreeEntry::dir(),
                tar::EntryType::Symlink => {
                    let target = entry
                        .link_name()
                        .map_err(archive_corrupt)?
                        .ok_or_else(|| archive_corrupt(format!("symlink {} has no target", rel)))?;
                    TreeEntry::symlink(&target.to_string_lossy())
                }
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    let mut content = Vec::new();
                    entry.read_to_end(&mut content).map_err(archive_corrupt)?;
                    let node = TreeEntry::file(content);
                    match mode {
                        Some(m) => node.with_mode(m),
                        None => node,
                    }
                }
                other => {
                    return Err(archive_corrupt(format!(
                        "unsupported entry type {:?} at {}",
                        other, rel
                    )))
                }
            };
            decoded.push((rel, node));
        }

        // Drain to the gzip trailer so a bad checksum is caught
        io::copy(&mut archive.into_inner(), &mut io::sink()).map_err(archive_corrupt)?;
        Ok(decoded)
    }

    /// Decode archive bytes into an in-memory tree
    pub fn decode_tree(&self, bytes: &[u8]) -> Result<FileTree> {
        let mut tree = FileTree::new();
        for (rel, entry) in self.decode(bytes)? {
            tree.insert(rel, entry);
        }
        Ok(tree)
    }

    /// Write every archived path into `dest_dir`, replacing what is there.
    ///
    /// Paths not in the archive are left untouched. Returns the number of
    /// files and symlinks written.
    ///
    /// # Errors
    ///
    /// `ArchiveCorrupt` before any write on malformed input; `Io` when a write fails.
    pub fn extract(&self, bytes: &[u8], dest_dir: &Path) -> Result<usize> {
        let entries = self.decode(bytes)?;
        fs::create_dir_all(dest_dir).map_err(|e| io_error_at("archive_extract", dest_dir, e))?;

        let mut written = 0;
        for (rel, entry) in &entries {
            materialize_entry(dest_dir, rel, entry)?;
            if entry.kind != EntryKind::Dir {
                written += 1;
            }
        }
        tracing::debug!(dest = %dest_dir.display(), written, "archive extracted");
        Ok(written)
    }
}

/// Reject absolute paths and parent traversal; normalise to `/` separators
fn safe_relative(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(archive_corrupt(format!(
                    "unsafe entry path {}",
                    path.display()
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(archive_corrupt("entry with empty path"));
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .unwrap_or(FILE_MODE)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    FILE_MODE
}
