//! Mutating vault commands as data, applied through one entry point.

#![allow(clippy::result_large_err)]

use crate::commands::resolve::ResolveRequest;
use crate::commands::rollback::RollbackOptions;
use crate::vault::Vault;
use snapvault_core::consent::RollbackConsent;
use snapvault_core::model::{
    ArtifactVersion, ConflictRecord, DeploymentRecord, RollbackResult, Snapshot,
};
use snapvault_store::errors::Result;

/// Commands that change a collection, its history or the version ledger.
#[derive(Debug, Clone)]
pub enum VaultCommand {
    CreateSnapshot {
        collection: String,
        message: String,
    },
    DeleteSnapshot {
        collection: String,
        snapshot_id: String,
    },
    Prune {
        collection: String,
        keep_count: usize,
    },
    IntelligentRollback {
        collection: String,
        snapshot_id: String,
        options: RollbackOptions,
    },
    /// Destructive restore without merge or safety snapshot
    Rollback {
        collection: String,
        snapshot_id: String,
        confirm: bool,
    },
    ResolveConflict {
        collection: String,
        request: ResolveRequest,
    },
    RecordArtifactVersion {
        collection: String,
        artifact_name: String,
        artifact_type: String,
    },
    RegisterDeployment(DeploymentRecord),
}

/// Result of applying a vault command.
#[derive(Debug, Clone)]
pub enum VaultCommandResult {
    SnapshotCreated(Snapshot),
    SnapshotDeleted { snapshot_id: String },
    Pruned(Vec<Snapshot>),
    RolledBack(RollbackResult),
    ConflictResolved(ConflictRecord),
    VersionRecorded(ArtifactVersion),
}

/// Apply a command; `consent` is consulted only by confirmed rollbacks.
///
/// # Errors
///
/// Whatever the underlying `Vault` operation returns.
pub fn apply_vault_command(
    cmd: VaultCommand,
    vault: &Vault,
    consent: &dyn RollbackConsent,
) -> Result<VaultCommandResult> {
    match cmd {
        VaultCommand::CreateSnapshot {
            collection,
            message,
        } => vault
            .create_snapshot(&collection, &message)
            .map(VaultCommandResult::SnapshotCreated),
        VaultCommand::DeleteSnapshot {
            collection,
            snapshot_id,
        } => {
            vault.delete_snapshot(&snapshot_id, &collection)?;
            Ok(VaultCommandResult::SnapshotDeleted { snapshot_id })
        }
        VaultCommand::Prune {
            collection,
            keep_count,
        } => vault
            .prune(&collection, keep_count)
            .map(VaultCommandResult::Pruned),
        VaultCommand::IntelligentRollback {
            collection,
            snapshot_id,
            options,
        } => vault
            .intelligent_rollback(&snapshot_id, &collection, &options, consent)
            .map(VaultCommandResult::RolledBack),
        VaultCommand::Rollback {
            collection,
            snapshot_id,
            confirm,
        } => vault
            .rollback(&snapshot_id, &collection, confirm, consent)
            .map(VaultCommandResult::RolledBack),
        VaultCommand::ResolveConflict {
            collection,
            request,
        } => vault
            .resolve_conflict(&collection, request)
            .map(VaultCommandResult::ConflictResolved),
        VaultCommand::RecordArtifactVersion {
            collection,
            artifact_name,
            artifact_type,
        } => vault
            .record_artifact_version(&collection, &artifact_name, &artifact_type)
            .map(VaultCommandResult::VersionRecorded),
        VaultCommand::RegisterDeployment(record) => vault
            .register_deployment(&record)
            .map(VaultCommandResult::VersionRecorded),
    }
}
