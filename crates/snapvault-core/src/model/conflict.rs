use serde::{Deserialize, Serialize};

/// Shape of a three-way merge conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Text file changed differently on both sides
    Content,
    /// Deleted locally, changed in the target
    Deletion,
    /// Added on both sides with different content
    AddAdd,
    /// Binary file changed differently on both sides
    BothModified,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::Content => write!(f, "content"),
            ConflictType::Deletion => write!(f, "deletion"),
            ConflictType::AddAdd => write!(f, "add_add"),
            ConflictType::BothModified => write!(f, "both_modified"),
        }
    }
}

/// Caller-chosen resolution for a conflict. The merge engine never sets one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    UseLocal,
    UseRemote,
    UseBase,
    Custom,
}

impl std::str::FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "use_local" => Ok(ResolutionStrategy::UseLocal),
            "use_remote" => Ok(ResolutionStrategy::UseRemote),
            "use_base" => Ok(ResolutionStrategy::UseBase),
            "custom" => Ok(ResolutionStrategy::Custom),
            other => Err(format!(
                "invalid resolution strategy: {other}. Expected: use_local, use_remote, use_base, custom"
            )),
        }
    }
}

/// A path the merge could not settle on its own.
///
/// Text content is carried for text files so a caller can present or
/// resolve the conflict without re-reading the snapshots. Binary and
/// symlink conflicts carry none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub file_path: String,
    pub conflict_type: ConflictType,
    pub base_content: Option<String>,
    pub local_content: Option<String>,
    pub target_content: Option<String>,
    pub auto_mergeable: bool,
    pub resolution_strategy: Option<ResolutionStrategy>,
    pub is_binary: bool,
    /// A symlink on at least one side
    #[serde(default)]
    pub is_symlink: bool,
}
