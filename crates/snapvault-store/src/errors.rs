//! `ExError` constructors for store failures.

use snapvault_core::errors::{ExError, ExErrorKind};
use std::path::Path;

pub type Result<T> = std::result::Result<T, ExError>;

pub fn snapshot_not_found(collection: &str, snapshot_id: &str) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_collection(collection)
        .with_entity_id(snapshot_id)
        .with_message("Snapshot not found")
}

pub fn validation(op: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Validation)
        .with_op(op)
        .with_message(reason)
}

/// Archive bytes that do not decode as a snapshot
pub fn archive_corrupt(reason: impl std::fmt::Display) -> ExError {
    ExError::new(ExErrorKind::ArchiveCorrupt)
        .with_op("archive_decode")
        .with_message(reason.to_string())
}

pub fn lock_error(lock_file: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op("collection_lock")
        .with_entity_id(lock_file.display().to_string())
        .with_message(err.to_string())
}

pub fn io_error(op: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(op)
        .with_message(err.to_string())
}

/// I/O failure on a known path; the path becomes the entity id
pub fn io_error_at(op: &str, path: &Path, err: std::io::Error) -> ExError {
    io_error(op, err).with_entity_id(path.display().to_string())
}

pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

pub fn from_serde(err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("serde_json")
        .with_message(err.to_string())
}

pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_entity_id(migration_id)
        .with_message(format!("migration failed: {}", reason))
}

/// An applied migration whose embedded SQL no longer matches its record
pub fn checksum_mismatch(migration_id: &str, recorded: &str, embedded: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_entity_id(migration_id)
        .with_message(format!(
            "applied with checksum {}, embedded SQL now has {}",
            recorded, embedded
        ))
}
