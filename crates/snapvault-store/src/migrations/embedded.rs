//! SQL schemas compiled into the binary.

/// One schema step, identified by its file stem
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Which database a set of migrations builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationSet {
    /// `collections/<name>/catalog.db`: snapshots and rollback audit
    Catalog,
    /// `versions.db`: artifact versions and deployment drift status
    Registry,
}

const CATALOG: &[Migration] = &[
    Migration {
        id: "001_snapshots",
        sql: include_str!("../../migrations/catalog/001_snapshots.sql"),
    },
    Migration {
        id: "002_rollback_audit",
        sql: include_str!("../../migrations/catalog/002_rollback_audit.sql"),
    },
];

const REGISTRY: &[Migration] = &[
    Migration {
        id: "001_artifact_versions",
        sql: include_str!("../../migrations/registry/001_artifact_versions.sql"),
    },
    Migration {
        id: "002_deployment_status",
        sql: include_str!("../../migrations/registry/002_deployment_status.sql"),
    },
];

impl MigrationSet {
    /// Steps in application order
    pub fn migrations(self) -> &'static [Migration] {
        match self {
            MigrationSet::Catalog => CATALOG,
            MigrationSet::Registry => REGISTRY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationSet::Catalog => "catalog",
            MigrationSet::Registry => "registry",
        }
    }
}
