#![allow(clippy::result_large_err)]

use super::rows::{
    all_ids, delete_snapshot_row, insert_snapshot, newest_id, select_page, select_snapshot,
};
use super::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::archive::ArchiveStore;
use crate::atomic::{atomic_write, is_temp_file};
use crate::db;
use crate::errors::{io_error_at, snapshot_not_found, Result};
use crate::lock::CollectionLock;
use crate::paths::{snapshot_id_from_archive, validate_collection_name, StorePaths};
use chrono::Utc;
use rusqlite::Connection;
use snapvault_core::errors::{ExError, ExErrorKind, VaultError};
use snapvault_core::hash::sha256_hex;
use snapvault_core::model::snapshot::next_snapshot_id;
use snapvault_core::model::{Snapshot, SnapshotPage};
use snapvault_core::tree::FileTree;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Outcome of re-reading a snapshot archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVerification {
    pub snapshot_id: String,
    /// Archive bytes hash to the recorded `archive_digest`
    pub digest_matches: bool,
    /// Archive decodes without error
    pub decodable: bool,
    /// Decoded tree hashes to the recorded `content_hash`
    pub content_matches: bool,
    pub entry_count: usize,
}

impl SnapshotVerification {
    pub fn is_valid(&self) -> bool {
        self.digest_matches && self.decodable && self.content_matches
    }
}

/// Catalog of snapshots, one catalog per collection under a store root.
///
/// Mutations take the collection lock; `*_locked` variants accept a held
/// lock so a caller can group several mutations in one critical section.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: StorePaths,
    archive: ArchiveStore,
}

impl SnapshotStore {
    pub fn new(paths: StorePaths, archive: ArchiveStore) -> Self {
        Self { paths, archive }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn archive_store(&self) -> &ArchiveStore {
        &self.archive
    }

    /// Block until the collection lock is held
    pub fn lock(&self, collection: &str) -> Result<CollectionLock> {
        CollectionLock::acquire(&self.paths, collection)
    }

    /// Open (and migrate) the catalog of a collection
    pub(crate) fn open_catalog(&self, collection: &str) -> Result<Connection> {
        db::open_catalog(&self.paths, collection)
    }

    /// Open the catalog only if the collection has one
    fn open_existing_catalog(&self, collection: &str) -> Result<Option<Connection>> {
        validate_collection_name(collection)?;
        if !self.paths.catalog_db(collection)?.exists() {
            return Ok(None);
        }
        self.open_catalog(collection).map(Some)
    }

    /// Snapshot the directory at `collection_path` under `collection_name`.
    ///
    /// # Errors
    ///
    /// `Io` when `collection_path` is missing or an archive write fails,
    /// `Validation` for a bad collection name.
    pub fn create(
        &self,
        collection_path: &Path,
        collection_name: &str,
        message: &str,
    ) -> Result<Snapshot> {
        let lock = self.lock(collection_name)?;
        self.create_locked(&lock, collection_path, message)
    }

    /// `create` inside an already held collection lock
    pub fn create_locked(
        &self,
        lock: &CollectionLock,
        collection_path: &Path,
        message: &str,
    ) -> Result<Snapshot> {
        let collection = lock.collection();
        let bytes = self
            .archive
            .create(collection_path)
            .map_err(|e| e.with_collection(collection))?;
        // Hash what was archived, not a second read of the live tree
        let tree = self.archive.decode_tree(&bytes)?;

        let conn = self.open_catalog(collection)?;
        let newest = newest_id(&conn)?;
        let (id, timestamp) = next_snapshot_id(Utc::now(), newest.as_deref());
        let archive_path = self.paths.archive_file(collection, &id)?;

        atomic_write(&archive_path, &bytes).map_err(|e| e.with_collection(collection))?;
        tracing::debug!(collection, snapshot_id = %id, bytes = bytes.len(), "archive written");

        let snapshot = Snapshot {
            id: id.clone(),
            timestamp,
            message: message.to_string(),
            collection_name: collection.to_string(),
            artifact_count: tree.top_level_count(),
            archive_path: archive_path.display().to_string(),
            content_hash: tree.content_hash(),
            archive_digest: sha256_hex(&bytes),
            size_bytes: bytes.len() as u64,
        };

        if let Err(e) = insert_snapshot(&conn, &snapshot) {
            fs::remove_file(&archive_path).ok();
            return Err(e.with_collection(collection));
        }
        tracing::debug!(collection, snapshot_id = %id, "catalog row inserted");

        // Confirm the archive the row points at
        let confirmed = fs::metadata(&archive_path)
            .map(|m| m.len() == snapshot.size_bytes)
            .unwrap_or(false);
        if !confirmed {
            delete_snapshot_row(&conn, &id)?;
            fs::remove_file(&archive_path).ok();
            return Err(ExError::new(ExErrorKind::Io)
                .with_op("create_snapshot")
                .with_collection(collection)
                .with_entity_id(id)
                .with_message("archive missing or truncated after indexing"));
        }

        Ok(snapshot)
    }

    /// One page of snapshots, newest first.
    ///
    /// `limit` defaults to 50 and must be within 1..=100. `cursor` is the
    /// last id of the previous page; the page holds only older snapshots.
    ///
    /// # Errors
    ///
    /// `Validation` on an out-of-range limit or a cursor that names no
    /// snapshot of the collection.
    pub fn list(
        &self,
        collection: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<SnapshotPage> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(ExError::from(VaultError::InvalidLimit { limit })
                .with_op("list_snapshots")
                .with_collection(collection));
        }
        let unknown_cursor = |cursor: &str| {
            ExError::from(VaultError::UnknownCursor {
                cursor: cursor.to_string(),
            })
            .with_op("list_snapshots")
            .with_collection(collection)
        };

        let Some(conn) = self.open_existing_catalog(collection)? else {
            return match cursor {
                Some(c) => Err(unknown_cursor(c)),
                None => Ok(SnapshotPage {
                    snapshots: Vec::new(),
                    next_cursor: None,
                }),
            };
        };

        if let Some(c) = cursor {
            if select_snapshot(&conn, c)?.is_none() {
                return Err(unknown_cursor(c));
            }
        }

        if let Err(e) = self.sweep_orphans(&conn, collection) {
            tracing::warn!(collection, error = %e, "orphan archive sweep failed");
        }

        let mut snapshots = select_page(&conn, cursor, limit + 1)?;
        let next_cursor = if snapshots.len() > limit {
            snapshots.truncate(limit);
            snapshots.last().map(|s| s.id.clone())
        } else {
            None
        };
        Ok(SnapshotPage {
            snapshots,
            next_cursor,
        })
    }

    /// `None` when the collection has no such snapshot
    pub fn get(&self, snapshot_id: &str, collection: &str) -> Result<Option<Snapshot>> {
        match self.open_existing_catalog(collection)? {
            Some(conn) => select_snapshot(&conn, snapshot_id),
            None => Ok(None),
        }
    }

    /// Names of every collection that has a catalog, sorted
    pub fn collections(&self) -> Result<Vec<String>> {
        let dir = self.paths.collections_dir();
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error_at("list_collections", &dir, e)),
        };
        let mut names = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|e| io_error_at("list_collections", &dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_collection_name(&name).is_ok() && self.paths.catalog_db(&name)?.exists() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Most recently created snapshot of the collection
    pub fn latest(&self, collection: &str) -> Result<Option<Snapshot>> {
        let Some(conn) = self.open_existing_catalog(collection)? else {
            return Ok(None);
        };
        Ok(select_page(&conn, None, 1)?.into_iter().next())
    }

    /// # Errors
    ///
    /// `NotFound` when the collection has no such snapshot.
    pub fn delete(&self, snapshot_id: &str, collection: &str) -> Result<()> {
        let lock = self.lock(collection)?;
        self.delete_locked(&lock, snapshot_id).map(|_| ())
    }

    /// `delete` inside an already held collection lock; returns the removed snapshot
    pub fn delete_locked(&self, lock: &CollectionLock, snapshot_id: &str) -> Result<Snapshot> {
        let collection = lock.collection();
        let conn = self.open_catalog(collection)?;
        let snapshot = select_snapshot(&conn, snapshot_id)?
            .ok_or_else(|| snapshot_not_found(collection, snapshot_id).with_op("delete_snapshot"))?;
        remove_snapshot(&conn, &snapshot)?;
        Ok(snapshot)
    }

    /// Keep the `keep_count` newest snapshots and delete the rest.
    ///
    /// Returns the deleted snapshots, newest first.
    pub fn prune(&self, collection: &str, keep_count: usize) -> Result<Vec<Snapshot>> {
        let lock = self.lock(collection)?;
        let conn = self.open_catalog(lock.collection())?;
        let mut deleted = Vec::new();
        for id in all_ids(&conn)?.into_iter().skip(keep_count) {
            if let Some(snapshot) = select_snapshot(&conn, &id)? {
                remove_snapshot(&conn, &snapshot)?;
                deleted.push(snapshot);
            }
        }
        tracing::debug!(collection, keep_count, deleted = deleted.len(), "pruned snapshots");
        Ok(deleted)
    }

    /// Extract the snapshot over `dest_dir`.
    ///
    /// Every archived path overwrites `dest_dir`; paths only in `dest_dir`
    /// are left as they are. Returns the number of files and symlinks written.
    pub fn restore(&self, snapshot: &Snapshot, dest_dir: &Path) -> Result<usize> {
        let bytes = self.read_archive(snapshot)?;
        self.archive
            .extract(&bytes, dest_dir)
            .map_err(|e| e.with_collection(&snapshot.collection_name))
    }

    pub fn read_archive(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let path = Path::new(&snapshot.archive_path);
        fs::read(path).map_err(|e| {
            io_error_at("read_archive", path, e).with_collection(&snapshot.collection_name)
        })
    }

    /// Decode a snapshot's archive into an in-memory tree
    pub fn load_tree(&self, snapshot: &Snapshot) -> Result<FileTree> {
        let bytes = self.read_archive(snapshot)?;
        self.archive
            .decode_tree(&bytes)
            .map_err(|e| e.with_collection(&snapshot.collection_name).with_entity_id(&snapshot.id))
    }

    /// Re-read an archive and check it against the catalog
    pub fn verify(&self, snapshot_id: &str, collection: &str) -> Result<SnapshotVerification> {
        let snapshot = self
            .get(snapshot_id, collection)?
            .ok_or_else(|| snapshot_not_found(collection, snapshot_id).with_op("verify_snapshot"))?;
        let bytes = self.read_archive(&snapshot)?;
        let digest_matches = sha256_hex(&bytes) == snapshot.archive_digest;
        let (decodable, content_matches, entry_count) = match self.archive.decode_tree(&bytes) {
            Ok(tree) => (true, tree.content_hash() == snapshot.content_hash, tree.len()),
            Err(e) if e.kind() == ExErrorKind::ArchiveCorrupt => (false, false, 0),
            Err(e) => return Err(e),
        };
        Ok(SnapshotVerification {
            snapshot_id: snapshot.id,
            digest_matches,
            decodable,
            content_matches,
            entry_count,
        })
    }

    /// Remove archives that have no catalog row and are older than the
    /// newest row. In-flight creates are always newer, so they are never hit.
    fn sweep_orphans(&self, conn: &Connection, collection: &str) -> Result<Vec<String>> {
        let ids = all_ids(conn)?;
        let Some(newest) = ids.first().cloned() else {
            return Ok(Vec::new());
        };
        let known: HashSet<String> = ids.into_iter().collect();
        let dir = self.paths.archives_dir(collection)?;
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error_at("sweep_orphans", &dir, e)),
        };

        let mut swept = Vec::new();
        for entry in listing {
            let path = entry.map_err(|e| io_error_at("sweep_orphans", &dir, e))?.path();
            if is_temp_file(&path) {
                continue;
            }
            let Some(id) = snapshot_id_from_archive(&path) else {
                continue;
            };
            if id < newest && !known.contains(&id) {
                fs::remove_file(&path).map_err(|e| io_error_at("sweep_orphans", &path, e))?;
                tracing::debug!(collection, snapshot_id = %id, "orphan archive swept");
                swept.push(id);
            }
        }
        Ok(swept)
    }
}

/// Row first, archive second
fn remove_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    delete_snapshot_row(conn, &snapshot.id)?;
    let path = Path::new(&snapshot.archive_path);
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(io_error_at("delete_snapshot", path, e)
                .with_collection(&snapshot.collection_name))
        }
    }
    tracing::debug!(
        collection = %snapshot.collection_name,
        snapshot_id = %snapshot.id,
        "snapshot removed"
    );
    Ok(())
}
