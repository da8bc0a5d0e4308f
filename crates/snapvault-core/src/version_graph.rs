//! Deployment drift detection and version graph assembly.
//!
//! Drift is detected by re-hashing each deployed copy and comparing it with
//! the hash recorded at deployment time. The drift timestamp follows the
//! content: it is set on the transition into the modified state and cleared
//! when the content matches again.
//!
//! The version graph is shallow: the current collection version at the root
//! and one child per deployment whose parent hash belongs to the collection's
//! lineage. Deployments of unknown origin are kept as orphaned nodes. A
//! node's modified flag comes from the last drift check when one ran, since
//! a deleted location leaves no observation in the ledger.

use crate::errors::{Result, VaultError};
use crate::hash::{ContentHash, ContentHasher};
use crate::model::{
    ArtifactVersion, DeploymentModificationStatus, DeploymentRecord, GraphStatistics,
    ModificationState, VersionGraph, VersionGraphNode,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Apply one drift observation to the state carried from the previous check.
pub fn transition(
    prior: &ModificationState,
    is_modified: bool,
    now: DateTime<Utc>,
) -> ModificationState {
    let modification_detected_at = match (is_modified, prior.is_modified) {
        (false, _) => None,
        (true, false) => Some(now),
        (true, true) => prior.modification_detected_at.or(Some(now)),
    };
    ModificationState {
        is_modified,
        modification_detected_at,
    }
}

#[derive(Debug, Clone, Default)]
pub struct VersionGraphBuilder {
    hasher: ContentHasher,
    lineage: HashSet<ContentHash>,
    drift: HashMap<String, bool>,
}

impl VersionGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Earlier collection hashes a deployment may descend from
    pub fn with_lineage(mut self, lineage: impl IntoIterator<Item = ContentHash>) -> Self {
        self.lineage.extend(lineage);
        self
    }

    /// Modified flags from the last check, keyed by deployment location
    pub fn with_drift_states(mut self, states: impl IntoIterator<Item = (String, bool)>) -> Self {
        self.drift.extend(states);
        self
    }

    /// Check deployments with no prior state
    ///
    /// # Errors
    ///
    /// `VaultError::Io` when an existing location cannot be read.
    pub fn check_modifications(
        &self,
        deployments: &[DeploymentRecord],
        now: DateTime<Utc>,
    ) -> Result<Vec<DeploymentModificationStatus>> {
        deployments
            .iter()
            .map(|d| self.check_modification(d, None, now))
            .collect()
    }

    /// Re-hash one deployed location and derive its drift state.
    ///
    /// A location that no longer exists has no current hash and counts as
    /// modified.
    ///
    /// # Errors
    ///
    /// `VaultError::Io` when an existing location cannot be read.
    pub fn check_modification(
        &self,
        deployment: &DeploymentRecord,
        prior: Option<&ModificationState>,
        now: DateTime<Utc>,
    ) -> Result<DeploymentModificationStatus> {
        let location = Path::new(&deployment.location);
        let current_hash = match std::fs::symlink_metadata(location) {
            Ok(_) => Some(self.hasher.hash(location)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(VaultError::io("check_modifications", location, e)),
        };
        let is_modified = current_hash.as_ref() != Some(&deployment.deployed_hash);
        let state = transition(&prior.cloned().unwrap_or_default(), is_modified, now);

        if state.is_modified && !prior.is_some_and(|p| p.is_modified) {
            tracing::debug!(
                artifact = %deployment.artifact_name,
                location = %deployment.location,
                "deployment drift detected"
            );
        }

        Ok(DeploymentModificationStatus {
            deployment: deployment.clone(),
            current_hash,
            is_modified: state.is_modified,
            modification_detected_at: state.modification_detected_at,
            checked_at: now,
        })
    }

    /// Assemble the graph for one artifact.
    ///
    /// A deployment is a child of the root when its `parent_hash` is the
    /// root's hash or any hash in the builder's lineage; otherwise it is
    /// orphaned. Without a collection version every deployment is orphaned.
    pub fn build_graph(
        &self,
        artifact_name: &str,
        artifact_type: &str,
        collection_version: Option<ArtifactVersion>,
        deployment_versions: Vec<ArtifactVersion>,
    ) -> VersionGraph {
        let mut orphaned_nodes = Vec::new();
        let root = match collection_version {
            Some(version) => {
                let mut root = VersionGraphNode::leaf(version, false);
                for deployment in deployment_versions {
                    let is_modified = self.deployment_is_modified(&deployment);
                    let descends = deployment.parent_hash.as_ref().is_some_and(|parent| {
                        *parent == root.version.content_hash || self.lineage.contains(parent)
                    });
                    let node = VersionGraphNode::leaf(deployment, is_modified);
                    if descends {
                        root.children.push(node);
                    } else {
                        orphaned_nodes.push(node);
                    }
                }
                Some(root)
            }
            None => {
                orphaned_nodes.extend(deployment_versions.into_iter().map(|d| {
                    let is_modified = self.deployment_is_modified(&d);
                    VersionGraphNode::leaf(d, is_modified)
                }));
                None
            }
        };

        let children = root.as_ref().map_or(0, VersionGraphNode::descendant_count);
        let statistics = GraphStatistics {
            total_deployments: children + orphaned_nodes.len(),
            modified_count: root.as_ref().map_or(0, VersionGraphNode::modified_descendants),
            orphaned_count: orphaned_nodes.len(),
        };

        VersionGraph {
            artifact_name: artifact_name.to_string(),
            artifact_type: artifact_type.to_string(),
            root,
            orphaned_nodes,
            statistics,
        }
    }

    /// Last checked state, else whether the observed content differs from
    /// what was deployed
    fn deployment_is_modified(&self, version: &ArtifactVersion) -> bool {
        self.drift
            .get(&version.location)
            .copied()
            .unwrap_or_else(|| version.parent_hash.as_ref() != Some(&version.content_hash))
    }
}
