//! Append-only rollback history, stored in each collection's catalog.

#![allow(clippy::result_large_err)]

use crate::catalog::rows::{format_ts, parse_ts};
use crate::db;
use crate::errors::{from_rusqlite, from_serde, Result};
use crate::paths::{validate_collection_name, StorePaths};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use snapvault_core::model::{AuditEntry, OperationType};

const AUDIT_COLUMNS: &str = "id, created_at, collection_name, source_snapshot_id, target_snapshot_id, \
     operation_type, files_restored, files_merged, conflicts_resolved, conflicts_pending, \
     preserve_changes_enabled, selective_paths, success, error";

/// Rollback audit log. Entries are never edited or removed, failures included.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    paths: StorePaths,
}

impl AuditTrail {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// Time-ordered id for a new entry
    pub fn next_id() -> String {
        uuid::Uuid::now_v7().to_string()
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut conn = db::open_catalog(&self.paths, &entry.collection_name)?;
        let selective_paths = entry
            .selective_paths
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(from_serde)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        tx.execute(
            "INSERT INTO rollback_audit (id, seq, created_at, collection_name, source_snapshot_id,
                 target_snapshot_id, operation_type, files_restored, files_merged,
                 conflicts_resolved, conflicts_pending, preserve_changes_enabled,
                 selective_paths, success, error)
             VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM rollback_audit), ?2, ?3, ?4,
                 ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                entry.id,
                format_ts(&entry.timestamp),
                entry.collection_name,
                entry.source_snapshot_id,
                entry.target_snapshot_id,
                entry.operation_type.as_str(),
                entry.files_restored as i64,
                entry.files_merged as i64,
                entry.conflicts_resolved as i64,
                entry.conflicts_pending as i64,
                entry.preserve_changes_enabled,
                selective_paths,
                entry.success,
                entry.error,
            ],
        )
        .map_err(|e| from_rusqlite(e).with_op("audit_append").with_entity_id(&entry.id))?;
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(
            collection = %entry.collection_name,
            audit_id = %entry.id,
            operation_type = %entry.operation_type,
            success = entry.success,
            "audit entry appended"
        );
        Ok(())
    }

    /// Newest first, at most `limit` entries
    pub fn get_history(&self, collection: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        validate_collection_name(collection)?;
        if limit == 0 || !self.paths.catalog_db(collection)?.exists() {
            return Ok(Vec::new());
        }
        let conn = db::open_catalog(&self.paths, collection)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM rollback_audit ORDER BY seq DESC LIMIT ?1",
                AUDIT_COLUMNS
            ))
            .map_err(from_rusqlite)?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(entries)
    }

    /// `None` when the collection has no entry with this id
    pub fn get_entry(&self, collection: &str, id: &str) -> Result<Option<AuditEntry>> {
        validate_collection_name(collection)?;
        if !self.paths.catalog_db(collection)?.exists() {
            return Ok(None);
        }
        let conn = db::open_catalog(&self.paths, collection)?;
        conn.query_row(
            &format!("SELECT {} FROM rollback_audit WHERE id = ?1", AUDIT_COLUMNS),
            [id],
            row_to_entry,
        )
        .optional()
        .map_err(from_rusqlite)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let created_at: String = row.get(1)?;
    let operation_type: String = row.get(5)?;
    let selective_paths: Option<String> = row.get(11)?;
    let count = |idx: usize| -> rusqlite::Result<usize> {
        let v: i64 = row.get(idx)?;
        Ok(v.max(0) as usize)
    };

    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: parse_ts(&created_at, 1)?,
        collection_name: row.get(2)?,
        source_snapshot_id: row.get(3)?,
        target_snapshot_id: row.get(4)?,
        operation_type: operation_type.parse::<OperationType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into())
        })?,
        files_restored: count(6)?,
        files_merged: count(7)?,
        conflicts_resolved: count(8)?,
        conflicts_pending: count(9)?,
        preserve_changes_enabled: row.get(10)?,
        selective_paths: selective_paths
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?,
        success: row.get(12)?,
        error: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(collection: &str, success: bool) -> AuditEntry {
        AuditEntry {
            id: AuditTrail::next_id(),
            timestamp: Utc::now(),
            collection_name: collection.to_string(),
            source_snapshot_id: Some("20260101T000000.000001Z".into()),
            target_snapshot_id: "20260101T000000.000000Z".into(),
            operation_type: OperationType::Selective,
            files_restored: 2,
            files_merged: 1,
            conflicts_resolved: 0,
            conflicts_pending: 1,
            preserve_changes_enabled: true,
            selective_paths: Some(vec!["skill-a".into()]),
            success,
            error: (!success).then(|| "disk full".to_string()),
        }
    }

    #[test]
    fn test_history_is_newest_first_and_scoped() {
        let dir = TempDir::new().unwrap();
        let trail = AuditTrail::new(StorePaths::new(dir.path()));
        let first = entry("skills", true);
        let second = entry("skills", false);
        trail.append(&first).unwrap();
        trail.append(&second).unwrap();
        trail.append(&entry("other", true)).unwrap();

        let history = trail.get_history("skills", 10).unwrap();
        assert_eq!(history, vec![second.clone(), first]);
        assert_eq!(trail.get_history("skills", 1).unwrap(), vec![second.clone()]);
        assert_eq!(trail.get_entry("skills", &second.id).unwrap(), Some(second));
    }

    #[test]
    fn test_rows_cannot_be_updated() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::new(dir.path());
        let trail = AuditTrail::new(paths.clone());
        trail.append(&entry("skills", true)).unwrap();

        let conn = db::open_catalog(&paths, "skills").unwrap();
        assert!(conn.execute("UPDATE rollback_audit SET success = 0", []).is_err());
        assert!(conn.execute("DELETE FROM rollback_audit", []).is_err());
    }

    #[test]
    fn test_unknown_collection_has_empty_history() {
        let dir = TempDir::new().unwrap();
        let trail = AuditTrail::new(StorePaths::new(dir.path()));
        assert!(trail.get_history("nothing", 5).unwrap().is_empty());
        assert!(trail.get_entry("nothing", "id").unwrap().is_none());
    }
}
