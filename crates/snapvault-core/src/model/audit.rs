use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of rollback recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Full destructive restore, no merge
    Simple,
    /// Three-way merge over the whole tree
    Intelligent,
    /// Three-way merge restricted to selected paths
    Selective,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Simple => "simple",
            OperationType::Intelligent => "intelligent",
            OperationType::Selective => "selective",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(OperationType::Simple),
            "intelligent" => Ok(OperationType::Intelligent),
            "selective" => Ok(OperationType::Selective),
            other => Err(format!("unknown operation type: {other}")),
        }
    }
}

/// One row of the append-only rollback history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// UUIDv7, so ids sort by creation time
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub collection_name: String,
    /// Safety snapshot for intelligent rollbacks, newest snapshot for simple ones
    pub source_snapshot_id: Option<String>,
    pub target_snapshot_id: String,
    pub operation_type: OperationType,
    pub files_restored: usize,
    pub files_merged: usize,
    pub conflicts_resolved: usize,
    pub conflicts_pending: usize,
    pub preserve_changes_enabled: bool,
    pub selective_paths: Option<Vec<String>>,
    pub success: bool,
    pub error: Option<String>,
}
