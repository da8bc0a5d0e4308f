//! Artifact versions, deployment drift status and version graphs.

use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an artifact version was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Collection,
    Deployment,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Collection => "collection",
            LocationType::Deployment => "deployment",
        }
    }
}

impl std::str::FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(LocationType::Collection),
            "deployment" => Ok(LocationType::Deployment),
            other => Err(format!("unknown location type: {other}")),
        }
    }
}

/// One observation of an artifact's content at a location.
///
/// Superseded by a newer observation when the content changes; never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub artifact_name: String,
    pub artifact_type: String,
    pub content_hash: ContentHash,
    pub location: String,
    pub location_type: LocationType,
    /// For collection versions the previous collection hash; for deployments
    /// the collection hash the copy was deployed from
    pub parent_hash: Option<ContentHash>,
    pub created_at: DateTime<Utc>,
}

/// A deployed copy as reported by the deployment registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub artifact_name: String,
    pub artifact_type: String,
    pub deployed_hash: ContentHash,
    pub location: String,
}

/// Drift state carried from one check to the next
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationState {
    pub is_modified: bool,
    pub modification_detected_at: Option<DateTime<Utc>>,
}

/// Result of checking one deployment for drift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentModificationStatus {
    #[serde(flatten)]
    pub deployment: DeploymentRecord,
    /// `None` when the location no longer exists
    pub current_hash: Option<ContentHash>,
    pub is_modified: bool,
    pub modification_detected_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl DeploymentModificationStatus {
    pub fn state(&self) -> ModificationState {
        ModificationState {
            is_modified: self.is_modified,
            modification_detected_at: self.modification_detected_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGraphNode {
    pub version: ArtifactVersion,
    pub is_modified: bool,
    pub children: Vec<VersionGraphNode>,
}

impl VersionGraphNode {
    pub fn leaf(version: ArtifactVersion, is_modified: bool) -> Self {
        Self {
            version,
            is_modified,
            children: Vec::new(),
        }
    }

    /// Modified descendants, excluding this node
    pub fn modified_descendants(&self) -> usize {
        self.children
            .iter()
            .map(|c| usize::from(c.is_modified) + c.modified_descendants())
            .sum()
    }

    /// All descendants, excluding this node
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// Derived counts; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_deployments: usize,
    pub modified_count: usize,
    pub orphaned_count: usize,
}

/// Collection version at the root, deployments as children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGraph {
    pub artifact_name: String,
    pub artifact_type: String,
    pub root: Option<VersionGraphNode>,
    pub orphaned_nodes: Vec<VersionGraphNode>,
    pub statistics: GraphStatistics,
}
