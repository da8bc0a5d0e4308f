//! Collection-scoped advisory lock backed by `collections/<name>/LOCK`.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error_at, lock_error, Result};
use crate::paths::StorePaths;
use fs2::FileExt;
use std::fs::{File, OpenOptions};

/// Exclusive lock on one collection; released when dropped.
///
/// Holding a `CollectionLock` is also the proof that store operations
/// taking `&CollectionLock` run inside the critical section.
#[derive(Debug)]
pub struct CollectionLock {
    file: File,
    collection: String,
}

impl CollectionLock {
    /// Block until the lock is held. There is no timeout.
    pub fn acquire(paths: &StorePaths, collection: &str) -> Result<Self> {
        paths.ensure_collection(collection)?;
        let lock_path = paths.lock_file(collection)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_error_at("collection_lock", &lock_path, e))?;

        file.lock_exclusive()
            .map_err(|e| lock_error(&lock_path, e).with_collection(collection))?;

        tracing::debug!(collection, "collection lock acquired");
        Ok(Self {
            file,
            collection: collection.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well
        FileExt::unlock(&self.file).ok();
        tracing::debug!(collection = %self.collection, "collection lock released");
    }
}
