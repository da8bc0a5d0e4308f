use super::conflict::ConflictRecord;
use serde::{Deserialize, Serialize};

/// Preview of what an intelligent rollback would do. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackSafetyAnalysis {
    /// True when the merge produced no conflicts
    pub is_safe: bool,
    pub target_snapshot_id: String,
    /// Live tree differs from the merge base
    pub local_changes_detected: bool,
    pub files_with_conflicts: Vec<String>,
    pub files_safe_to_restore: Vec<String>,
    pub files_to_merge: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of a rollback invocation.
///
/// `success` is true even when conflicts are pending; it is false only when
/// a write failed part way, in which case `error` is set and the counters
/// reflect what was actually written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    pub snapshot_id: String,
    pub files_restored: usize,
    pub files_merged: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub safety_snapshot_id: Option<String>,
    pub error: Option<String>,
}

impl RollbackResult {
    /// True when the rollback succeeded and nothing awaits manual resolution
    pub fn is_fully_resolved(&self) -> bool {
        self.success && self.conflicts.is_empty()
    }
}
