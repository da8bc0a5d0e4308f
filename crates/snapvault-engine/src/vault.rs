//! The `Vault` facade: the operation surface the rest of a product calls.
//!
//! Every operation is bracketed by `start` and `end` (or `end_error`) log
//! events carrying the op name, collection and duration.

#![allow(clippy::result_large_err)]

use crate::commands::modifications;
use crate::commands::resolve::{self, ResolveRequest};
use crate::commands::rollback::{RollbackCoordinator, RollbackOptions};
use crate::config::VaultConfig;
use chrono::Utc;
use snapvault_core::consent::RollbackConsent;
use snapvault_core::errors::{ExError, ExErrorKind};
use snapvault_core::model::{
    ArtifactVersion, AuditEntry, ConflictRecord, DeploymentModificationStatus, DeploymentRecord,
    RollbackResult, RollbackSafetyAnalysis, Snapshot, SnapshotPage, VersionGraph,
};
use snapvault_core::{log_op_end, log_op_error, log_op_start};
use snapvault_store::archive::ArchiveStore;
use snapvault_store::catalog::SnapshotVerification;
use snapvault_store::errors::{io_error_at, validation, Result};
use snapvault_store::paths::validate_collection_name;
use snapvault_store::{AuditTrail, SnapshotStore, StorePaths, VersionStore};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

/// One store root plus the live roots of its collections.
#[derive(Debug, Clone)]
pub struct Vault {
    config: VaultConfig,
    snapshots: SnapshotStore,
    audit: AuditTrail,
    versions: VersionStore,
    coordinator: RollbackCoordinator,
}

impl Vault {
    /// # Errors
    ///
    /// `Validation` for an invalid config, `Io` when the store root cannot
    /// be created.
    pub fn open(config: VaultConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.store_root)
            .map_err(|e| io_error_at("open_vault", &config.store_root, e))?;
        let paths = StorePaths::new(&config.store_root);
        let snapshots = SnapshotStore::new(
            paths.clone(),
            ArchiveStore::new(config.compression_level),
        );
        let audit = AuditTrail::new(paths.clone());
        let versions = VersionStore::new(paths);
        let coordinator = RollbackCoordinator::new(snapshots.clone(), audit.clone());
        tracing::debug!(store_root = %config.store_root.display(), "vault opened");
        Ok(Self {
            config,
            snapshots,
            audit,
            versions,
            coordinator,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// # Errors
    ///
    /// `Validation` for an invalid collection name.
    pub fn register_collection(&mut self, name: &str, root: impl Into<PathBuf>) -> Result<()> {
        validate_collection_name(name)?;
        self.config.collections.insert(name.to_string(), root.into());
        Ok(())
    }

    /// Live root of a registered collection.
    ///
    /// # Errors
    ///
    /// `NotFound` when no root is registered under `collection`.
    pub fn collection_root(&self, collection: &str) -> Result<&Path> {
        validate_collection_name(collection)?;
        self.config
            .collections
            .get(collection)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                ExError::new(ExErrorKind::NotFound)
                    .with_op("collection_root")
                    .with_collection(collection)
                    .with_message("Collection is not registered")
            })
    }

    /// # Errors
    ///
    /// `NotFound` for an unregistered collection, `Io` when its live root
    /// is missing or an archive write fails.
    pub fn create_snapshot(&self, collection: &str, message: &str) -> Result<Snapshot> {
        instrumented("create_snapshot", collection, || {
            let root = self.collection_root(collection)?;
            self.snapshots.create(root, collection, message)
        })
    }

    /// Newest-first page; `limit` defaults to the configured page size.
    ///
    /// # Errors
    ///
    /// `Validation` for a limit outside 1..=100 or an unknown cursor.
    pub fn list_snapshots(
        &self,
        collection: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<SnapshotPage> {
        instrumented("list_snapshots", collection, || {
            let limit = limit.unwrap_or(self.config.default_list_limit);
            self.snapshots.list(collection, Some(limit), cursor)
        })
    }

    /// # Errors
    ///
    /// `Validation` for an invalid collection name.
    pub fn get_snapshot(&self, snapshot_id: &str, collection: &str) -> Result<Option<Snapshot>> {
        instrumented("get_snapshot", collection, || {
            self.snapshots.get(snapshot_id, collection)
        })
    }

    /// # Errors
    ///
    /// `NotFound` when the snapshot does not exist.
    pub fn delete_snapshot(&self, snapshot_id: &str, collection: &str) -> Result<()> {
        instrumented("delete_snapshot", collection, || {
            self.snapshots.delete(snapshot_id, collection)
        })
    }

    /// Keep the `keep_count` newest snapshots; returns the deleted ones.
    ///
    /// # Errors
    ///
    /// `Io` or `Persistence` when a deletion fails.
    pub fn prune(&self, collection: &str, keep_count: usize) -> Result<Vec<Snapshot>> {
        instrumented("prune", collection, || {
            self.snapshots.prune(collection, keep_count)
        })
    }

    /// Extract a snapshot over `dest_dir`; returns files and symlinks written.
    ///
    /// # Errors
    ///
    /// `NotFound` when the snapshot does not exist, `ArchiveCorrupt` or
    /// `Io` from extraction.
    pub fn restore_snapshot(
        &self,
        snapshot_id: &str,
        collection: &str,
        dest_dir: &Path,
    ) -> Result<usize> {
        instrumented("restore_snapshot", collection, || {
            let snapshot = self.require_snapshot(snapshot_id, collection, "restore_snapshot")?;
            self.snapshots.restore(&snapshot, dest_dir)
        })
    }

    /// # Errors
    ///
    /// `NotFound` when the snapshot does not exist, `Io` when its archive
    /// cannot be read.
    pub fn verify_snapshot(
        &self,
        snapshot_id: &str,
        collection: &str,
    ) -> Result<SnapshotVerification> {
        instrumented("verify_snapshot", collection, || {
            self.snapshots.verify(snapshot_id, collection)
        })
    }

    /// # Errors
    ///
    /// `NotFound` for an unregistered collection, `Io` when its live root
    /// is missing.
    pub fn analyze_rollback_safety(
        &self,
        snapshot_id: &str,
        collection: &str,
    ) -> Result<RollbackSafetyAnalysis> {
        instrumented("analyze_rollback_safety", collection, || {
            let root = self.collection_root(collection)?;
            self.coordinator.analyze_safety(snapshot_id, collection, root)
        })
    }

    /// # Errors
    ///
    /// `NotFound` for a missing target or unregistered collection,
    /// `Validation` ("cancelled") when consent is withheld.
    pub fn intelligent_rollback(
        &self,
        snapshot_id: &str,
        collection: &str,
        options: &RollbackOptions,
        consent: &dyn RollbackConsent,
    ) -> Result<RollbackResult> {
        instrumented("intelligent_rollback", collection, || {
            let root = self.collection_root(collection)?;
            self.coordinator
                .intelligent_rollback(snapshot_id, collection, root, options, consent)
        })
    }

    /// # Errors
    ///
    /// `NotFound` for a missing target or unregistered collection,
    /// `Validation` ("cancelled") when consent is withheld.
    pub fn rollback(
        &self,
        snapshot_id: &str,
        collection: &str,
        confirm: bool,
        consent: &dyn RollbackConsent,
    ) -> Result<RollbackResult> {
        instrumented("rollback", collection, || {
            let root = self.collection_root(collection)?;
            self.coordinator
                .rollback(snapshot_id, collection, root, confirm, consent)
        })
    }

    /// # Errors
    ///
    /// See [`resolve::resolve_conflict`].
    pub fn resolve_conflict(
        &self,
        collection: &str,
        request: ResolveRequest,
    ) -> Result<ConflictRecord> {
        instrumented("resolve_conflict", collection, || {
            let root = self.collection_root(collection)?;
            resolve::resolve_conflict(&self.snapshots, collection, root, request)
        })
    }

    /// Newest first; an unknown collection has an empty history.
    ///
    /// # Errors
    ///
    /// `Persistence` on catalog failures.
    pub fn get_audit_history(&self, collection: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        instrumented("get_audit_history", collection, || {
            self.audit.get_history(collection, limit)
        })
    }

    /// # Errors
    ///
    /// `Persistence` on catalog failures.
    pub fn get_audit_entry(&self, collection: &str, entry_id: &str) -> Result<Option<AuditEntry>> {
        instrumented("get_audit_entry", collection, || {
            self.audit.get_entry(collection, entry_id)
        })
    }

    /// Hash `<collection root>/<artifact_name>` into the version ledger.
    ///
    /// # Errors
    ///
    /// `Validation` when `artifact_name` is not a plain relative path,
    /// `Io` when the artifact is missing.
    pub fn record_artifact_version(
        &self,
        collection: &str,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<ArtifactVersion> {
        instrumented("record_artifact_version", collection, || {
            let root = self.collection_root(collection)?;
            let plain = !artifact_name.is_empty()
                && Path::new(artifact_name)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return Err(validation(
                    "record_artifact_version",
                    format!("invalid artifact name '{}'", artifact_name),
                ));
            }
            self.versions
                .record_collection_version(artifact_name, artifact_type, &root.join(artifact_name))
        })
    }

    /// # Errors
    ///
    /// `Persistence` on ledger failures.
    pub fn register_deployment(&self, record: &DeploymentRecord) -> Result<ArtifactVersion> {
        instrumented("register_deployment", "", || self.versions.record_deployment(record))
    }

    /// Every deployment the ledger knows about
    ///
    /// # Errors
    ///
    /// `Persistence` on ledger failures.
    pub fn known_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        instrumented("known_deployments", "", || self.versions.known_deployments())
    }

    /// # Errors
    ///
    /// `Io` when an existing deployment location cannot be read.
    pub fn check_project_modifications(
        &self,
        deployments: &[DeploymentRecord],
    ) -> Result<Vec<DeploymentModificationStatus>> {
        instrumented("check_project_modifications", "", || {
            modifications::check_project_modifications(&self.versions, deployments, Utc::now())
        })
    }

    /// # Errors
    ///
    /// `Persistence` on ledger failures.
    pub fn get_version_graph(
        &self,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<VersionGraph> {
        instrumented("get_version_graph", "", || {
            modifications::get_version_graph(&self.versions, artifact_name, artifact_type)
        })
    }

    fn require_snapshot(&self, snapshot_id: &str, collection: &str, op: &str) -> Result<Snapshot> {
        self.snapshots.get(snapshot_id, collection)?.ok_or_else(|| {
            snapvault_store::errors::snapshot_not_found(collection, snapshot_id).with_op(op)
        })
    }
}

/// Run `f` between start and end events; failures get `op` if they carry none
fn instrumented<T>(op: &'static str, collection: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    log_op_start!(op, collection = collection);
    let result = f();
    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(value) => {
            log_op_end!(op, duration_ms = duration_ms, collection = collection);
            Ok(value)
        }
        Err(err) => {
            let err = if err.op().is_none() { err.with_op(op) } else { err };
            log_op_error!(op, &err, duration_ms = duration_ms, collection = collection);
            Err(err)
        }
    }
}
