//! Rollback orchestration.
//!
//! ## Intelligent rollback pipeline (in order):
//! 1. Take the collection lock (held until the audit entry is written)
//! 2. Resolve the target snapshot (NotFound, no writes)
//! 3. Load base (newest snapshot on record, or empty), local and target trees
//! 4. Three-way merge
//! 5. Consent hook when `confirm` is set (hard stop, no writes)
//! 6. Safety snapshot of the live tree
//! 7. Apply restores, or replace everything when `preserve_changes` is off
//! 8. Append one audit entry
//!
//! A write failure in step 7 stops further writes and is reported in the
//! result, not raised; the audit entry is still appended. Once writes have
//! started, a failed audit append is reported the same way.

#![allow(clippy::result_large_err)]

use chrono::Utc;
use snapvault_core::consent::{ConsentRequest, RollbackConsent};
use snapvault_core::errors::{ExError, VaultError};
use snapvault_core::merge::{MergeEngine, MergeOutcome};
use snapvault_core::model::{
    AuditEntry, OperationType, RollbackResult, RollbackSafetyAnalysis, Snapshot,
};
use snapvault_core::tree::{EntryKind, FileTree};
use snapvault_store::archive::materialize_entry;
use snapvault_store::errors::{snapshot_not_found, validation, Result};
use snapvault_store::{AuditTrail, CollectionLock, SnapshotStore};
use std::path::{Component, Path};

/// Message of the snapshot taken before every intelligent rollback
pub const SAFETY_SNAPSHOT_MESSAGE: &str = "Pre-rollback safety snapshot";

/// Options for an intelligent rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Merge with local edits; when false the live tree is overwritten with the target
    pub preserve_changes: bool,
    /// Restrict writes to these paths (and everything below them)
    pub selective_paths: Option<Vec<String>>,
    /// Ask the consent hook before writing
    pub confirm: bool,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            preserve_changes: true,
            selective_paths: None,
            confirm: true,
        }
    }
}

/// Paths a rollback may write
struct Selection<'a>(Option<&'a [String]>);

impl Selection<'_> {
    fn contains(&self, path: &str) -> bool {
        match self.0 {
            None => true,
            Some(selected) => selected.iter().any(|s| {
                let s = s.trim_end_matches('/');
                path == s
                    || path
                        .strip_prefix(s)
                        .is_some_and(|rest| rest.starts_with('/'))
            }),
        }
    }
}

#[derive(Debug, Default)]
struct WriteProgress {
    restored: usize,
    merged: usize,
}

/// Trees and merge result for one rollback
struct Reconciliation {
    outcome: MergeOutcome,
    base: FileTree,
    local: FileTree,
    target: FileTree,
    had_base: bool,
}

/// Runs safety analysis and rollbacks against one snapshot store.
#[derive(Debug, Clone)]
pub struct RollbackCoordinator {
    snapshots: SnapshotStore,
    audit: AuditTrail,
    merge: MergeEngine,
}

impl RollbackCoordinator {
    pub fn new(snapshots: SnapshotStore, audit: AuditTrail) -> Self {
        Self {
            snapshots,
            audit,
            merge: MergeEngine::new(),
        }
    }

    /// Preview an intelligent rollback without writing anything.
    ///
    /// A missing target is reported as a warning (and `is_safe = false`),
    /// not as an error.
    ///
    /// # Errors
    ///
    /// `Io` when the live collection directory is missing or unreadable,
    /// `ArchiveCorrupt` when the base or target archive cannot be decoded.
    pub fn analyze_safety(
        &self,
        target_snapshot_id: &str,
        collection: &str,
        collection_path: &Path,
    ) -> Result<RollbackSafetyAnalysis> {
        let mut warnings = Vec::new();
        let target = self.snapshots.get(target_snapshot_id, collection)?;
        let target_tree = match &target {
            Some(snapshot) => {
                if snapshot.collection_name != collection {
                    warnings.push(format!(
                        "target snapshot {} belongs to collection {}",
                        target_snapshot_id, snapshot.collection_name
                    ));
                }
                self.snapshots.load_tree(snapshot)?
            }
            None => {
                warnings.push(format!(
                    "target snapshot {} does not exist in collection {}",
                    target_snapshot_id, collection
                ));
                for owner in self.owners_elsewhere(target_snapshot_id, collection)? {
                    warnings.push(format!(
                        "target snapshot {} belongs to collection {}",
                        target_snapshot_id, owner
                    ));
                }
                FileTree::new()
            }
        };

        let rec = self.reconcile(collection, collection_path, target_tree)?;
        if !rec.had_base {
            warnings.push(
                "collection has no prior snapshots; local changes may be over-reported"
                    .to_string(),
            );
        }
        let mut analysis = analysis_from(target_snapshot_id, &rec.outcome, warnings);
        if target.is_none() {
            analysis.is_safe = false;
        }
        Ok(analysis)
    }

    /// Roll the live tree back to `target_snapshot_id`, merging local edits.
    ///
    /// # Errors
    ///
    /// `NotFound` when the target is missing, `Validation` ("cancelled")
    /// when the consent hook refuses, `Validation` for unsafe selective
    /// paths. Write failures after the safety snapshot are reported in the
    /// returned `RollbackResult` instead.
    pub fn intelligent_rollback(
        &self,
        target_snapshot_id: &str,
        collection: &str,
        collection_path: &Path,
        options: &RollbackOptions,
        consent: &dyn RollbackConsent,
    ) -> Result<RollbackResult> {
        if let Some(paths) = &options.selective_paths {
            validate_selection(paths)?;
        }
        let operation = if options.selective_paths.is_some() {
            OperationType::Selective
        } else {
            OperationType::Intelligent
        };

        let lock = self.snapshots.lock(collection)?;
        let target = self.require_target(target_snapshot_id, collection, "intelligent_rollback")?;
        let target_tree = self.snapshots.load_tree(&target)?;
        let rec = self.reconcile(collection, collection_path, target_tree)?;

        if options.confirm {
            let analysis = analysis_from(target_snapshot_id, &rec.outcome, Vec::new());
            let request = ConsentRequest {
                collection_name: collection,
                target_snapshot_id,
                operation,
                analysis: Some(&analysis),
            };
            if !consent.approve(&request) {
                return Err(cancelled("intelligent_rollback", collection, target_snapshot_id));
            }
        }

        let safety = self
            .snapshots
            .create_locked(&lock, collection_path, SAFETY_SNAPSHOT_MESSAGE)?;

        let selection = Selection(options.selective_paths.as_deref());
        let mut progress = WriteProgress::default();
        let written = if options.preserve_changes {
            apply_merge(collection_path, &rec, &selection, &mut progress)
        } else {
            replace_tree(collection_path, &rec.target, &selection, &mut progress)
        };
        let conflicts = if options.preserve_changes {
            rec.outcome
                .conflicts
                .into_iter()
                .filter(|c| selection.contains(&c.file_path))
                .collect()
        } else {
            Vec::new()
        };

        let result = RollbackResult {
            success: written.is_ok(),
            snapshot_id: target.id.clone(),
            files_restored: progress.restored,
            files_merged: progress.merged,
            conflicts,
            safety_snapshot_id: Some(safety.id.clone()),
            error: written.err().map(|e| e.to_string()),
        };
        let audited = self.record(
            &lock,
            Some(safety.id),
            operation,
            &result,
            options.preserve_changes,
            options.selective_paths.clone(),
        );
        Ok(with_audit_outcome(lock.collection(), result, audited))
    }

    /// Overwrite the live tree with `target_snapshot_id`: no merge, no
    /// safety snapshot. Paths absent from the target are left alone.
    ///
    /// # Errors
    ///
    /// `NotFound` when the target is missing, `Validation` ("cancelled")
    /// when the consent hook refuses.
    pub fn rollback(
        &self,
        target_snapshot_id: &str,
        collection: &str,
        collection_path: &Path,
        confirm: bool,
        consent: &dyn RollbackConsent,
    ) -> Result<RollbackResult> {
        let lock = self.snapshots.lock(collection)?;
        let target = self.require_target(target_snapshot_id, collection, "rollback")?;
        if confirm {
            let request = ConsentRequest {
                collection_name: collection,
                target_snapshot_id,
                operation: OperationType::Simple,
                analysis: None,
            };
            if !consent.approve(&request) {
                return Err(cancelled("rollback", collection, target_snapshot_id));
            }
        }

        let source = self.snapshots.latest(collection)?.map(|s| s.id);
        let target_tree = self.snapshots.load_tree(&target)?;
        let mut progress = WriteProgress::default();
        let written = replace_tree(collection_path, &target_tree, &Selection(None), &mut progress);

        let result = RollbackResult {
            success: written.is_ok(),
            snapshot_id: target.id.clone(),
            files_restored: progress.restored,
            files_merged: 0,
            conflicts: Vec::new(),
            safety_snapshot_id: None,
            error: written.err().map(|e| e.to_string()),
        };
        let audited = self.record(&lock, source, OperationType::Simple, &result, false, None);
        Ok(with_audit_outcome(lock.collection(), result, audited))
    }

    fn require_target(&self, snapshot_id: &str, collection: &str, op: &str) -> Result<Snapshot> {
        self.snapshots
            .get(snapshot_id, collection)?
            .ok_or_else(|| snapshot_not_found(collection, snapshot_id).with_op(op))
    }

    /// Base is the newest snapshot on record at call time
    fn reconcile(
        &self,
        collection: &str,
        collection_path: &Path,
        target: FileTree,
    ) -> Result<Reconciliation> {
        let base_snapshot = self.snapshots.latest(collection)?;
        let base = match &base_snapshot {
            Some(snapshot) => self.snapshots.load_tree(snapshot)?,
            None => FileTree::new(),
        };
        let local = FileTree::from_dir(collection_path)
            .map_err(|e| ExError::from(e).with_collection(collection))?;
        let outcome = self.merge.merge(&base, &local, &target);
        Ok(Reconciliation {
            outcome,
            base,
            local,
            target,
            had_base: base_snapshot.is_some(),
        })
    }

    /// Other collections whose catalog holds `snapshot_id`
    fn owners_elsewhere(&self, snapshot_id: &str, collection: &str) -> Result<Vec<String>> {
        let mut owners = Vec::new();
        for name in self.snapshots.collections()? {
            if name != collection && self.snapshots.get(snapshot_id, &name)?.is_some() {
                owners.push(name);
            }
        }
        Ok(owners)
    }

    fn record(
        &self,
        lock: &CollectionLock,
        source_snapshot_id: Option<String>,
        operation_type: OperationType,
        result: &RollbackResult,
        preserve_changes_enabled: bool,
        selective_paths: Option<Vec<String>>,
    ) -> Result<()> {
        let entry = AuditEntry {
            id: AuditTrail::next_id(),
            timestamp: Utc::now(),
            collection_name: lock.collection().to_string(),
            source_snapshot_id,
            target_snapshot_id: result.snapshot_id.clone(),
            operation_type,
            files_restored: result.files_restored,
            files_merged: result.files_merged,
            conflicts_resolved: 0,
            conflicts_pending: result.conflicts.len(),
            preserve_changes_enabled,
            selective_paths,
            success: result.success,
            error: result.error.clone(),
        };
        self.audit.append(&entry)?;
        tracing::debug!(
            collection = lock.collection(),
            audit_id = %entry.id,
            operation = %operation_type,
            success = result.success,
            "rollback audited"
        );
        Ok(())
    }
}

/// Fold a failed audit append into the result so written files and the
/// safety snapshot id still reach the caller.
fn with_audit_outcome(
    collection: &str,
    mut result: RollbackResult,
    audited: Result<()>,
) -> RollbackResult {
    if let Err(err) = audited {
        tracing::error!(
            collection,
            snapshot_id = %result.snapshot_id,
            error = %err,
            "rollback audit entry not written"
        );
        result.success = false;
        result.error = Some(match result.error.take() {
            Some(write_err) => format!("{}; audit entry not written: {}", write_err, err),
            None => format!("audit entry not written: {}", err),
        });
    }
    result
}

fn analysis_from(
    target_snapshot_id: &str,
    outcome: &MergeOutcome,
    warnings: Vec<String>,
) -> RollbackSafetyAnalysis {
    RollbackSafetyAnalysis {
        is_safe: outcome.is_clean(),
        target_snapshot_id: target_snapshot_id.to_string(),
        local_changes_detected: outcome.local_changes_detected(),
        files_with_conflicts: outcome.conflict_paths(),
        files_safe_to_restore: outcome.safe_restores.clone(),
        files_to_merge: outcome.merges.clone(),
        warnings,
    }
}

/// Write simple restores; preserved edits and conflicts keep local content.
///
/// Directories only the target has are created so its empty dirs come back.
fn apply_merge(
    root: &Path,
    rec: &Reconciliation,
    selection: &Selection<'_>,
    progress: &mut WriteProgress,
) -> Result<()> {
    progress.merged = rec
        .outcome
        .merges
        .iter()
        .filter(|p| selection.contains(p))
        .count();

    for (path, entry) in rec.target.iter() {
        if entry.kind == EntryKind::Dir
            && selection.contains(path)
            && rec.base.get(path).is_none()
            && rec.local.get(path).is_none()
        {
            materialize_entry(root, path, entry)?;
        }
    }
    for path in &rec.outcome.safe_restores {
        if !selection.contains(path) {
            continue;
        }
        if let Some(entry) = rec.target.get(path) {
            materialize_entry(root, path, entry)?;
            if entry.kind != EntryKind::Dir {
                progress.restored += 1;
            }
        }
    }
    Ok(())
}

/// Write every selected target entry over the live tree
fn replace_tree(
    root: &Path,
    target: &FileTree,
    selection: &Selection<'_>,
    progress: &mut WriteProgress,
) -> Result<()> {
    for (path, entry) in target.iter() {
        if !selection.contains(path) {
            continue;
        }
        materialize_entry(root, path, entry)?;
        if entry.kind != EntryKind::Dir {
            progress.restored += 1;
        }
    }
    Ok(())
}

fn validate_selection(paths: &[String]) -> Result<()> {
    for raw in paths {
        let trimmed = raw.trim_end_matches('/');
        let safe = !trimmed.is_empty()
            && Path::new(trimmed)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(validation(
                "intelligent_rollback",
                format!("invalid selective path '{}'", raw),
            ));
        }
    }
    Ok(())
}

fn cancelled(op: &str, collection: &str, snapshot_id: &str) -> ExError {
    ExError::from(VaultError::Cancelled)
        .with_op(op)
        .with_collection(collection)
        .with_entity_id(snapshot_id)
}
