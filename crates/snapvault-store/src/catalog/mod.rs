//! Per-collection snapshot catalog.
//!
//! Each collection owns a `catalog.db` (one row per snapshot) next to its
//! `archives/` directory. Writes keep the two in step:
//!
//! - create: archive written atomically, then the row inserted, then the
//!   archive confirmed; a failed confirm removes the row again
//! - delete: row removed first, then the archive
//!
//! so a catalog row never points at a missing archive. An archive left
//! without a row by a crash between the two delete steps is swept by the
//! next `list`.

pub(crate) mod rows;
mod snapshot_store;

pub use snapshot_store::{SnapshotStore, SnapshotVerification};

/// Page size used when the caller gives none
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Largest accepted page size
pub const MAX_LIST_LIMIT: usize = 100;
