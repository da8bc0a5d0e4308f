//! Snapvault Store - on-disk persistence for snapshots, audit and versions
//!
//! Provides:
//! - Per-collection directory layout with advisory locks
//! - Deterministic tar.gz archive codec preserving symlinks and empty dirs
//! - SQLite catalogs with an embedded, checksummed migrations framework
//! - Snapshot store (create, list, get, delete, prune, restore, verify)
//! - Append-only rollback audit trail
//! - Artifact version ledger with persisted drift state

pub mod archive;
pub mod atomic;
pub mod audit;
pub mod catalog;
pub mod db;
pub mod errors;
pub mod lock;
pub mod migrations;
pub mod paths;
pub mod versions;

// Re-export key types
pub use archive::ArchiveStore;
pub use audit::AuditTrail;
pub use catalog::SnapshotStore;
pub use errors::Result;
pub use lock::CollectionLock;
pub use paths::StorePaths;
pub use versions::VersionStore;
