//! Snapshot metadata and id generation.

use crate::hash::ContentHash;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// `strftime` layout of snapshot ids: UTC, microsecond precision.
pub const SNAPSHOT_ID_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Immutable point-in-time archive of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Timestamp-derived id, strictly increasing within a collection
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub collection_name: String,
    /// Number of top-level entries in the collection
    pub artifact_count: usize,
    pub archive_path: String,
    /// Tree hash of the collection when the snapshot was taken
    pub content_hash: ContentHash,
    /// SHA-256 of the archive file bytes
    pub archive_digest: String,
    pub size_bytes: u64,
}

/// One page of a newest-first listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPage {
    pub snapshots: Vec<Snapshot>,
    /// Id to pass back as `cursor` for the next page, `None` on the last page
    pub next_cursor: Option<String>,
}

/// Format a timestamp as a snapshot id
pub fn format_snapshot_id(ts: DateTime<Utc>) -> String {
    ts.format(SNAPSHOT_ID_FORMAT).to_string()
}

/// Parse a snapshot id back into its timestamp
pub fn parse_snapshot_id(id: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(id, SNAPSHOT_ID_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Allocate the next id for a collection.
///
/// Uses `now` unless the clock has not moved past `newest`, in which case
/// the id is `newest` plus one microsecond. Returns the id and its timestamp.
pub fn next_snapshot_id(now: DateTime<Utc>, newest: Option<&str>) -> (String, DateTime<Utc>) {
    let candidate = format_snapshot_id(now);
    match newest {
        Some(last) if candidate.as_str() <= last => {
            let base = parse_snapshot_id(last).unwrap_or(now);
            let bumped = base + Duration::microseconds(1);
            (format_snapshot_id(bumped), bumped)
        }
        _ => (candidate, now),
    }
}
