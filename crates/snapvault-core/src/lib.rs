//! Snapvault Core - in-memory versioning kernel
//!
//! This crate provides the pure building blocks of the snapshot and
//! reconciliation engine:
//! - Domain models for snapshots, rollbacks, audit entries and artifact versions
//! - Stable content hashing of files and directory trees
//! - In-memory file trees built from disk
//! - Three-way merge classification with conflict records
//! - Deployment drift detection and version graph assembly
//! - The canonical error and logging facilities shared by all crates
//!
//! Nothing in here owns on-disk state; persistence lives in `snapvault-store`.

pub mod consent;
pub mod errors;
pub mod hash;
pub mod logging_facility;
pub mod merge;
pub mod model;
pub mod tree;
pub mod version_graph;

// Re-export commonly used types
pub use consent::{AlwaysConsent, ConsentRequest, DenyConsent, RollbackConsent, SafeOnlyConsent};
pub use errors::{ExError, ExErrorKind, Result, VaultError};
pub use hash::{ContentHash, ContentHasher};
pub use merge::{MergeEngine, MergeOutcome};
pub use model::{
    ArtifactVersion, AuditEntry, ConflictRecord, ConflictType, LocationType, OperationType,
    ResolutionStrategy, RollbackResult, RollbackSafetyAnalysis, Snapshot,
};
pub use tree::{EntryKind, FileTree, TreeEntry};
pub use version_graph::VersionGraphBuilder;
