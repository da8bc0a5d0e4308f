//! Row mapping for the `snapshots` table.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use snapvault_core::hash::ContentHash;
use snapvault_core::model::Snapshot;

pub(crate) const SNAPSHOT_COLUMNS: &str = "id, collection_name, created_at, message, artifact_count, \
     archive_path, content_hash, archive_digest, size_bytes";

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn row_to_snapshot(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let created_at: String = row.get(2)?;
    let artifact_count: i64 = row.get(4)?;
    let content_hash: String = row.get(6)?;
    let size_bytes: i64 = row.get(8)?;
    Ok(Snapshot {
        id: row.get(0)?,
        collection_name: row.get(1)?,
        timestamp: parse_ts(&created_at, 2)?,
        message: row.get(3)?,
        artifact_count: artifact_count.max(0) as usize,
        archive_path: row.get(5)?,
        content_hash: ContentHash::from_hex(content_hash),
        archive_digest: row.get(7)?,
        size_bytes: size_bytes.max(0) as u64,
    })
}

pub(crate) fn insert_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshots (id, collection_name, created_at, message, artifact_count,
             archive_path, content_hash, archive_digest, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            snapshot.id,
            snapshot.collection_name,
            format_ts(&snapshot.timestamp),
            snapshot.message,
            snapshot.artifact_count as i64,
            snapshot.archive_path,
            snapshot.content_hash.as_str(),
            snapshot.archive_digest,
            snapshot.size_bytes as i64,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

pub(crate) fn select_snapshot(conn: &Connection, id: &str) -> Result<Option<Snapshot>> {
    conn.query_row(
        &format!("SELECT {} FROM snapshots WHERE id = ?1", SNAPSHOT_COLUMNS),
        [id],
        row_to_snapshot,
    )
    .optional()
    .map_err(from_rusqlite)
}

pub(crate) fn delete_snapshot_row(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM snapshots WHERE id = ?1", [id])
        .map_err(from_rusqlite)?;
    Ok(removed > 0)
}

pub(crate) fn newest_id(conn: &Connection) -> Result<Option<String>> {
    conn.query_row("SELECT MAX(id) FROM snapshots", [], |row| row.get(0))
        .map_err(from_rusqlite)
}

/// Newest first, strictly older than `before` when given
pub(crate) fn select_page(
    conn: &Connection,
    before: Option<&str>,
    limit: usize,
) -> Result<Vec<Snapshot>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM snapshots WHERE (?1 IS NULL OR id < ?1) ORDER BY id DESC LIMIT ?2",
            SNAPSHOT_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map(params![before, limit as i64], row_to_snapshot)
        .map_err(from_rusqlite)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

pub(crate) fn all_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT id FROM snapshots ORDER BY id DESC")
        .map_err(from_rusqlite)?;
    let ids = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}
