//! Domain models shared by the store and the engine.

pub mod audit;
pub mod conflict;
pub mod rollback;
pub mod snapshot;
pub mod version;

pub use audit::{AuditEntry, OperationType};
pub use conflict::{ConflictRecord, ConflictType, ResolutionStrategy};
pub use rollback::{RollbackResult, RollbackSafetyAnalysis};
pub use snapshot::{Snapshot, SnapshotPage};
pub use version::{
    ArtifactVersion, DeploymentModificationStatus, DeploymentRecord, GraphStatistics,
    LocationType, ModificationState, VersionGraph, VersionGraphNode,
};
