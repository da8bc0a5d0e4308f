#![allow(clippy::result_large_err)]

use super::checksums::sql_fingerprint;
use super::embedded::{Migration, MigrationSet};
use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

/// Bring `conn` up to date with every step of `set`
pub fn apply(conn: &mut Connection, set: MigrationSet) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
    )
    .map_err(from_rusqlite)?;

    let mut applied = 0;
    for step in set.migrations() {
        if apply_step(conn, step)? {
            applied += 1;
        }
    }
    if applied > 0 {
        tracing::debug!(set = set.as_str(), applied, "schema migrated");
    }
    Ok(())
}

/// Returns whether the step ran. Check and apply share one IMMEDIATE
/// transaction, so two processes opening a fresh database serialise here.
fn apply_step(conn: &mut Connection, step: &Migration) -> Result<bool> {
    let fingerprint = sql_fingerprint(step.sql);
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    let recorded: Option<Option<String>> = tx
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?1",
            [step.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    match recorded {
        Some(Some(expected)) if expected != fingerprint => {
            return Err(checksum_mismatch(step.id, &expected, &fingerprint));
        }
        Some(_) => return Ok(false),
        None => {}
    }

    tx.execute_batch(step.sql)
        .map_err(|e| migration_error(step.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![step.id, chrono::Utc::now().timestamp(), fingerprint],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;
    Ok(true)
}
