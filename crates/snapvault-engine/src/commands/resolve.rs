//! Manual resolution of rollback conflicts.

#![allow(clippy::result_large_err)]

use snapvault_core::model::{ConflictRecord, ResolutionStrategy};
use snapvault_core::tree::TreeEntry;
use snapvault_store::archive::{materialize_entry, remove_leaf};
use snapvault_store::errors::{snapshot_not_found, validation, Result};
use snapvault_store::SnapshotStore;
use std::path::Path;

/// A conflict and the caller's decision for it.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub conflict: ConflictRecord,
    pub strategy: ResolutionStrategy,
    /// Bytes written by `custom`
    pub custom_content: Option<Vec<u8>>,
    /// Snapshot read by `use_remote`. Without it the record's text is used,
    /// which binary and symlink conflicts do not carry.
    pub target_snapshot_id: Option<String>,
    /// Snapshot read by `use_base`, same rules as `target_snapshot_id`
    pub base_snapshot_id: Option<String>,
}

impl ResolveRequest {
    pub fn new(conflict: ConflictRecord, strategy: ResolutionStrategy) -> Self {
        Self {
            conflict,
            strategy,
            custom_content: None,
            target_snapshot_id: None,
            base_snapshot_id: None,
        }
    }
}

/// Apply a resolution to the live tree under the collection lock.
///
/// - `use_local` writes nothing
/// - `use_remote` writes the target side
/// - `use_base` writes the base side, or removes the path when base had none
/// - `custom` writes `custom_content`; refused for binary conflicts
///
/// Returns the record with `resolution_strategy` set.
///
/// # Errors
///
/// `Validation` when `custom` has no content or targets a binary file, or
/// when a binary or symlink conflict is resolved without the snapshot id
/// to read from.
/// `NotFound` when a named snapshot does not exist.
pub fn resolve_conflict(
    snapshots: &SnapshotStore,
    collection: &str,
    collection_path: &Path,
    request: ResolveRequest,
) -> Result<ConflictRecord> {
    let conflict = &request.conflict;
    let path = conflict.file_path.as_str();

    let side = match request.strategy {
        ResolutionStrategy::UseLocal => None,
        ResolutionStrategy::UseRemote => Some(side_entry(
            snapshots,
            collection,
            request.target_snapshot_id.as_deref(),
            conflict,
            conflict.target_content.as_deref(),
            "target",
        )?),
        ResolutionStrategy::UseBase => Some(side_entry(
            snapshots,
            collection,
            request.base_snapshot_id.as_deref(),
            conflict,
            conflict.base_content.as_deref(),
            "base",
        )?),
        ResolutionStrategy::Custom => {
            if conflict.is_binary {
                return Err(validation(
                    "resolve_conflict",
                    "custom content is not accepted for binary conflicts",
                )
                .with_entity_id(path));
            }
            let bytes = request.custom_content.clone().ok_or_else(|| {
                validation("resolve_conflict", "custom strategy needs content").with_entity_id(path)
            })?;
            Some(Some(TreeEntry::file(bytes)))
        }
    };

    if let Some(entry) = side {
        let _lock = snapshots.lock(collection)?;
        match entry {
            Some(entry) => materialize_entry(collection_path, path, &entry)?,
            None => remove_leaf(collection_path, path)?,
        }
    }

    tracing::debug!(
        collection,
        path,
        strategy = ?request.strategy,
        "conflict resolved"
    );
    let mut resolved = request.conflict;
    resolved.resolution_strategy = Some(request.strategy);
    Ok(resolved)
}

/// Content of one side of a conflict; `None` when that side has no file
fn side_entry(
    snapshots: &SnapshotStore,
    collection: &str,
    snapshot_id: Option<&str>,
    conflict: &ConflictRecord,
    text: Option<&str>,
    side: &str,
) -> Result<Option<TreeEntry>> {
    if let Some(id) = snapshot_id {
        let snapshot = snapshots
            .get(id, collection)?
            .ok_or_else(|| snapshot_not_found(collection, id).with_op("resolve_conflict"))?;
        return Ok(snapshots.load_tree(&snapshot)?.get(&conflict.file_path).cloned());
    }
    if conflict.is_binary || conflict.is_symlink {
        let what = if conflict.is_binary { "binary" } else { "symlink" };
        return Err(validation(
            "resolve_conflict",
            format!("{} conflict needs the {} snapshot id", what, side),
        )
        .with_entity_id(&conflict.file_path));
    }
    Ok(text.map(|t| TreeEntry::file(t.as_bytes().to_vec())))
}
