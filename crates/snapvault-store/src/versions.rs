//! Artifact version ledger and persisted drift state (`versions.db`).
//!
//! `artifact_versions` is append-only: an observation is superseded by a
//! newer row for the same artifact and location, never deleted.
//! `deployment_status` holds the drift state carried from one modification
//! check to the next.

#![allow(clippy::result_large_err)]

use crate::catalog::rows::{format_ts, parse_ts};
use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::paths::StorePaths;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use snapvault_core::errors::ExError;
use snapvault_core::hash::{ContentHash, ContentHasher};
use snapvault_core::model::{
    ArtifactVersion, DeploymentModificationStatus, DeploymentRecord, LocationType,
    ModificationState,
};
use std::path::Path;

const VERSION_COLUMNS: &str =
    "artifact_name, artifact_type, content_hash, location, location_type, parent_hash, created_at";

#[derive(Debug, Clone)]
pub struct VersionStore {
    paths: StorePaths,
    hasher: ContentHasher,
}

impl VersionStore {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            hasher: ContentHasher::new(),
        }
    }

    fn conn(&self) -> Result<Connection> {
        db::open_registry(&self.paths)
    }

    /// Hash the artifact at `path` and append a collection version if its
    /// content changed. Returns the current collection version.
    pub fn record_collection_version(
        &self,
        artifact_name: &str,
        artifact_type: &str,
        path: &Path,
    ) -> Result<ArtifactVersion> {
        let content_hash = self
            .hasher
            .hash(path)
            .map_err(|e| ExError::from(e).with_op("record_collection_version"))?;
        let conn = self.conn()?;
        let previous = latest_collection(&conn, artifact_name, artifact_type)?;
        if let Some(prev) = &previous {
            if prev.content_hash == content_hash {
                return Ok(prev.clone());
            }
        }
        let version = ArtifactVersion {
            artifact_name: artifact_name.to_string(),
            artifact_type: artifact_type.to_string(),
            content_hash,
            location: path.display().to_string(),
            location_type: LocationType::Collection,
            parent_hash: previous.map(|p| p.content_hash),
            created_at: Utc::now(),
        };
        insert_version(&conn, &version)?;
        tracing::debug!(
            artifact = artifact_name,
            hash = %version.content_hash,
            "collection version recorded"
        );
        Ok(version)
    }

    /// Register a deployed copy as it was at deployment time.
    ///
    /// A no-op while the latest row at the location already descends from
    /// the same deployed hash, so later observations are not masked.
    pub fn record_deployment(&self, record: &DeploymentRecord) -> Result<ArtifactVersion> {
        let version = ArtifactVersion {
            artifact_name: record.artifact_name.clone(),
            artifact_type: record.artifact_type.clone(),
            content_hash: record.deployed_hash.clone(),
            location: record.location.clone(),
            location_type: LocationType::Deployment,
            parent_hash: Some(record.deployed_hash.clone()),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        if let Some(latest) = latest_deployment_at(&conn, record)? {
            if latest.parent_hash == version.parent_hash {
                return Ok(latest);
            }
        }
        insert_version(&conn, &version)?;
        Ok(version)
    }

    /// Append an observation when a check saw content that differs from the
    /// last observation at that location. Missing locations record nothing.
    pub fn record_deployment_observation(
        &self,
        status: &DeploymentModificationStatus,
    ) -> Result<Option<ArtifactVersion>> {
        let Some(current) = &status.current_hash else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let latest = latest_deployment_at(&conn, &status.deployment)?;
        if latest.is_some_and(|l| &l.content_hash == current) {
            return Ok(None);
        }
        let version = ArtifactVersion {
            artifact_name: status.deployment.artifact_name.clone(),
            artifact_type: status.deployment.artifact_type.clone(),
            content_hash: current.clone(),
            location: status.deployment.location.clone(),
            location_type: LocationType::Deployment,
            parent_hash: Some(status.deployment.deployed_hash.clone()),
            created_at: status.checked_at,
        };
        insert_version(&conn, &version)?;
        Ok(Some(version))
    }

    pub fn latest_collection_version(
        &self,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<Option<ArtifactVersion>> {
        latest_collection(&self.conn()?, artifact_name, artifact_type)
    }

    /// Every collection hash the artifact has had, newest first
    pub fn collection_lineage(
        &self,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<Vec<ContentHash>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT content_hash FROM artifact_versions
                 WHERE artifact_name = ?1 AND artifact_type = ?2 AND location_type = 'collection'
                 ORDER BY seq DESC",
            )
            .map_err(from_rusqlite)?;
        let hashes = stmt
            .query_map(params![artifact_name, artifact_type], |row| {
                row.get::<_, String>(0).map(ContentHash::from_hex)
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(hashes)
    }

    /// Latest observation per deployed location of one artifact
    pub fn latest_deployment_versions(
        &self,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<Vec<ArtifactVersion>> {
        let conn = self.conn()?;
        query_latest_deployments(
            &conn,
            "v.artifact_name = ?1 AND v.artifact_type = ?2",
            params![artifact_name, artifact_type],
        )
    }

    /// Every registered deployment, as the deployment registry would report it
    pub fn known_deployments(&self) -> Result<Vec<DeploymentRecord>> {
        let conn = self.conn()?;
        let latest = query_latest_deployments(&conn, "1 = 1", params![])?;
        Ok(latest
            .into_iter()
            .map(|v| DeploymentRecord {
                deployed_hash: v.parent_hash.unwrap_or_else(|| v.content_hash.clone()),
                artifact_name: v.artifact_name,
                artifact_type: v.artifact_type,
                location: v.location,
            })
            .collect())
    }

    /// Drift state saved by the previous check of this deployment
    pub fn load_status(&self, record: &DeploymentRecord) -> Result<Option<ModificationState>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT is_modified, modification_detected_at FROM deployment_status
             WHERE artifact_name = ?1 AND artifact_type = ?2 AND location = ?3",
            params![record.artifact_name, record.artifact_type, record.location],
            |row| {
                let detected: Option<String> = row.get(1)?;
                Ok(ModificationState {
                    is_modified: row.get(0)?,
                    modification_detected_at: detected
                        .as_deref()
                        .map(|raw| parse_ts(raw, 1))
                        .transpose()?,
                })
            },
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// `(location, is_modified)` from the last check of each deployed copy
    pub fn drift_states(
        &self,
        artifact_name: &str,
        artifact_type: &str,
    ) -> Result<Vec<(String, bool)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT location, is_modified FROM deployment_status
                 WHERE artifact_name = ?1 AND artifact_type = ?2",
            )
            .map_err(from_rusqlite)?;
        let states = stmt
            .query_map(params![artifact_name, artifact_type], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(from_rusqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_rusqlite)?;
        Ok(states)
    }

    pub fn save_status(&self, status: &DeploymentModificationStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO deployment_status (artifact_name, artifact_type, location, deployed_hash,
                 current_hash, is_modified, modification_detected_at, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (artifact_name, artifact_type, location) DO UPDATE SET
                 deployed_hash = excluded.deployed_hash,
                 current_hash = excluded.current_hash,
                 is_modified = excluded.is_modified,
                 modification_detected_at = excluded.modification_detected_at,
                 checked_at = excluded.checked_at",
            params![
                status.deployment.artifact_name,
                status.deployment.artifact_type,
                status.deployment.location,
                status.deployment.deployed_hash.as_str(),
                status.current_hash.as_ref().map(ContentHash::as_str),
                status.is_modified,
                status.modification_detected_at.as_ref().map(format_ts),
                format_ts(&status.checked_at),
            ],
        )
        .map_err(from_rusqlite)?;
        Ok(())
    }
}

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<ArtifactVersion> {
    let content_hash: String = row.get(2)?;
    let location_type: String = row.get(4)?;
    let parent_hash: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(ArtifactVersion {
        artifact_name: row.get(0)?,
        artifact_type: row.get(1)?,
        content_hash: ContentHash::from_hex(content_hash),
        location: row.get(3)?,
        location_type: location_type
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?,
        parent_hash: parent_hash.map(ContentHash::from_hex),
        created_at: parse_ts(&created_at, 6)?,
    })
}

fn insert_version(conn: &Connection, version: &ArtifactVersion) -> Result<()> {
    conn.execute(
        "INSERT INTO artifact_versions (artifact_name, artifact_type, content_hash, location,
             location_type, parent_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            version.artifact_name,
            version.artifact_type,
            version.content_hash.as_str(),
            version.location,
            version.location_type.as_str(),
            version.parent_hash.as_ref().map(ContentHash::as_str),
            format_ts(&version.created_at),
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

fn latest_collection(
    conn: &Connection,
    artifact_name: &str,
    artifact_type: &str,
) -> Result<Option<ArtifactVersion>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM artifact_versions
             WHERE artifact_name = ?1 AND artifact_type = ?2 AND location_type = 'collection'
             ORDER BY seq DESC LIMIT 1",
            VERSION_COLUMNS
        ),
        params![artifact_name, artifact_type],
        row_to_version,
    )
    .optional()
    .map_err(from_rusqlite)
}

fn latest_deployment_at(
    conn: &Connection,
    record: &DeploymentRecord,
) -> Result<Option<ArtifactVersion>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM artifact_versions
             WHERE artifact_name = ?1 AND artifact_type = ?2 AND location_type = 'deployment'
               AND location = ?3
             ORDER BY seq DESC LIMIT 1",
            VERSION_COLUMNS
        ),
        params![record.artifact_name, record.artifact_type, record.location],
        row_to_version,
    )
    .optional()
    .map_err(from_rusqlite)
}

fn query_latest_deployments(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ArtifactVersion>> {
    let columns = VERSION_COLUMNS
        .split(", ")
        .map(|c| format!("v.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {columns} FROM artifact_versions v
         WHERE v.location_type = 'deployment' AND {filter}
           AND v.seq = (SELECT MAX(w.seq) FROM artifact_versions w
                        WHERE w.artifact_name = v.artifact_name
                          AND w.artifact_type = v.artifact_type
                          AND w.location_type = 'deployment'
                          AND w.location = v.location)
         ORDER BY v.artifact_name, v.location"
    );
    let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
    let versions = stmt
        .query_map(args, row_to_version)
        .map_err(from_rusqlite)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(from_rusqlite)?;
    Ok(versions)
}
