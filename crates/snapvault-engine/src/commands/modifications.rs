//! Deployment drift checks and version graphs backed by the version ledger.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use snapvault_core::model::{DeploymentModificationStatus, DeploymentRecord, VersionGraph};
use snapvault_core::version_graph::VersionGraphBuilder;
use snapvault_store::errors::Result;
use snapvault_store::VersionStore;

/// Re-hash every deployment and carry drift state across calls.
///
/// Each deployment is registered in the ledger (idempotent), checked
/// against the state saved by the previous check, and the new state is
/// saved. Content that differs from the last observation is appended to
/// the ledger as a new deployment version.
///
/// # Errors
///
/// `Io` when an existing deployment location cannot be read,
/// `Persistence` on ledger failures.
pub fn check_project_modifications(
    versions: &VersionStore,
    deployments: &[DeploymentRecord],
    now: DateTime<Utc>,
) -> Result<Vec<DeploymentModificationStatus>> {
    let builder = VersionGraphBuilder::new();
    let mut statuses = Vec::with_capacity(deployments.len());
    for deployment in deployments {
        versions.record_deployment(deployment)?;
        let prior = versions.load_status(deployment)?;
        let status = builder.check_modification(deployment, prior.as_ref(), now)?;
        versions.save_status(&status)?;
        versions.record_deployment_observation(&status)?;
        statuses.push(status);
    }
    Ok(statuses)
}

/// Collection version at the root, latest deployment observations below.
///
/// Modified flags follow the last drift check of each location.
///
/// # Errors
///
/// `Persistence` on ledger failures.
pub fn get_version_graph(
    versions: &VersionStore,
    artifact_name: &str,
    artifact_type: &str,
) -> Result<VersionGraph> {
    let collection_version = versions.latest_collection_version(artifact_name, artifact_type)?;
    let lineage = versions.collection_lineage(artifact_name, artifact_type)?;
    let deployments = versions.latest_deployment_versions(artifact_name, artifact_type)?;
    let drift = versions.drift_states(artifact_name, artifact_type)?;
    Ok(VersionGraphBuilder::new()
        .with_lineage(lineage)
        .with_drift_states(drift)
        .build_graph(artifact_name, artifact_type, collection_version, deployments))
}
