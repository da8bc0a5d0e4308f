//! Merge output types.

use crate::model::{ConflictRecord, ConflictType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a single path is handled by a rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClassification {
    /// Nothing changed on either side
    NoOp,
    /// Only the target changed; write the target's content
    SimpleRestore,
    /// Only local changed (or the target has no opinion); keep local
    PreservedEdit,
    /// Both changed to the same content; keep local
    ConvergentEdit,
    /// Both changed incompatibly; leave local and record a conflict
    Conflict(ConflictType),
}

impl PathClassification {
    /// True for every shape that needs no human decision
    pub fn auto_mergeable(&self) -> bool {
        !matches!(self, PathClassification::Conflict(_))
    }
}

/// Result of a three-way merge.
///
/// `safe_restores` are paths whose target content should be written,
/// `merges` are preserved local edits, `conflicts` need manual resolution.
/// `classifications` holds every visited path, including no-ops and
/// convergent edits which appear in none of the lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub safe_restores: Vec<String>,
    pub merges: Vec<String>,
    pub conflicts: Vec<ConflictRecord>,
    pub classifications: BTreeMap<String, PathClassification>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflict_paths(&self) -> Vec<String> {
        self.conflicts.iter().map(|c| c.file_path.clone()).collect()
    }

    pub fn classification(&self, path: &str) -> Option<PathClassification> {
        self.classifications.get(path).copied()
    }

    /// True when local differs from base at any path
    pub fn local_changes_detected(&self) -> bool {
        self.classifications.values().any(|c| {
            matches!(
                c,
                PathClassification::PreservedEdit
                    | PathClassification::ConvergentEdit
                    | PathClassification::Conflict(_)
            )
        })
    }
}
