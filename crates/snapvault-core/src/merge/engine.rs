//! Path classification and outcome assembly.

use super::model::{MergeOutcome, PathClassification};
use crate::model::{ConflictRecord, ConflictType};
use crate::tree::{EntryKind, FileTree, TreeEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Stateless three-way merge engine
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify every file and symlink path in the union of the three trees.
    pub fn merge(&self, base: &FileTree, local: &FileTree, target: &FileTree) -> MergeOutcome {
        let paths: BTreeSet<&String> = base
            .leaves()
            .chain(local.leaves())
            .chain(target.leaves())
            .map(|(path, _)| path)
            .collect();

        let mut outcome = MergeOutcome::default();
        for path in paths {
            let b = base.get(path);
            let l = local.get(path);
            let t = target.get(path);
            let class = classify(b, l, t);
            match class {
                PathClassification::SimpleRestore => outcome.safe_restores.push(path.clone()),
                PathClassification::PreservedEdit => outcome.merges.push(path.clone()),
                PathClassification::Conflict(conflict_type) => outcome
                    .conflicts
                    .push(conflict_record(path, conflict_type, b, l, t)),
                PathClassification::NoOp | PathClassification::ConvergentEdit => {}
            }
            outcome.classifications.insert(path.clone(), class);
        }
        demote_blocked_restores(&mut outcome, base, local, target);

        tracing::debug!(
            safe_restores = outcome.safe_restores.len(),
            merges = outcome.merges.len(),
            conflicts = outcome.conflicts.len(),
            "three-way merge classified"
        );
        outcome
    }
}

/// A restore below a conflicted path would write through whatever local
/// keeps there, so it takes the ancestor's conflict instead.
fn demote_blocked_restores(
    outcome: &mut MergeOutcome,
    base: &FileTree,
    local: &FileTree,
    target: &FileTree,
) {
    let conflicted: BTreeMap<String, ConflictType> = outcome
        .conflicts
        .iter()
        .map(|c| (c.file_path.clone(), c.conflict_type))
        .collect();
    if conflicted.is_empty() {
        return;
    }

    let mut demoted = Vec::new();
    outcome.safe_restores.retain(|path| {
        let blocking = path
            .match_indices('/')
            .find_map(|(i, _)| conflicted.get(&path[..i]).copied());
        match blocking {
            Some(conflict_type) => {
                demoted.push((path.clone(), conflict_type));
                false
            }
            None => true,
        }
    });
    for (path, conflict_type) in demoted {
        outcome.conflicts.push(conflict_record(
            &path,
            conflict_type,
            base.get(&path),
            local.get(&path),
            target.get(&path),
        ));
        outcome
            .classifications
            .insert(path, PathClassification::Conflict(conflict_type));
    }
    outcome.conflicts.sort_by(|a, b| a.file_path.cmp(&b.file_path));
}

fn same(a: Option<&TreeEntry>, b: Option<&TreeEntry>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_content(b),
        _ => false,
    }
}

/// Classify one path given its entry in each tree.
pub fn classify(
    base: Option<&TreeEntry>,
    local: Option<&TreeEntry>,
    target: Option<&TreeEntry>,
) -> PathClassification {
    let local_unchanged = same(local, base);

    // Absent from the target: no opinion
    if target.is_none() {
        return if local_unchanged {
            PathClassification::NoOp
        } else {
            PathClassification::PreservedEdit
        };
    }

    if local_unchanged {
        return if same(target, base) {
            PathClassification::NoOp
        } else {
            PathClassification::SimpleRestore
        };
    }
    if same(target, base) {
        return PathClassification::PreservedEdit;
    }
    if same(local, target) {
        return PathClassification::ConvergentEdit;
    }

    let conflict_type = match (base, local, target) {
        (_, None, _) => ConflictType::Deletion,
        (None, _, _) => ConflictType::AddAdd,
        (_, Some(l), Some(t)) if l.is_binary() || t.is_binary() => ConflictType::BothModified,
        _ => ConflictType::Content,
    };
    PathClassification::Conflict(conflict_type)
}

fn conflict_record(
    path: &str,
    conflict_type: ConflictType,
    base: Option<&TreeEntry>,
    local: Option<&TreeEntry>,
    target: Option<&TreeEntry>,
) -> ConflictRecord {
    let is_binary = [base, local, target]
        .iter()
        .flatten()
        .any(|e| e.is_binary());
    let is_symlink = [base, local, target]
        .iter()
        .flatten()
        .any(|e| e.kind == EntryKind::Symlink);
    let opaque = is_binary || is_symlink;
    let text = |e: Option<&TreeEntry>| if opaque { None } else { e.and_then(TreeEntry::text) };
    ConflictRecord {
        file_path: path.to_string(),
        conflict_type,
        base_content: text(base),
        local_content: text(local),
        target_content: text(target),
        auto_mergeable: false,
        resolution_strategy: None,
        is_binary,
        is_symlink,
    }
}
