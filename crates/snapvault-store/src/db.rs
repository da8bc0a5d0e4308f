//! SQLite connections for the catalog and registry databases.
//!
//! One connection per operation. WAL plus a busy timeout lets readers run
//! alongside a writer that holds the collection lock.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, io_error_at, Result};
use crate::migrations::{self, MigrationSet};
use crate::paths::StorePaths;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

fn open_migrated(path: &Path, set: MigrationSet) -> Result<Connection> {
    let mut conn = Connection::open(path).map_err(from_rusqlite)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)?;
    // journal_mode answers with a row, so it cannot go through pragma_update
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(from_rusqlite)?;
    migrations::apply(&mut conn, set)?;
    Ok(conn)
}

/// Open and migrate the catalog of one collection, creating its directory
pub fn open_catalog(paths: &StorePaths, collection: &str) -> Result<Connection> {
    paths.ensure_collection(collection)?;
    open_migrated(&paths.catalog_db(collection)?, MigrationSet::Catalog)
}

/// Open and migrate the store-wide artifact registry
pub fn open_registry(paths: &StorePaths) -> Result<Connection> {
    std::fs::create_dir_all(paths.root()).map_err(|e| io_error_at("open_registry", paths.root(), e))?;
    open_migrated(&paths.versions_db(), MigrationSet::Registry)
}
