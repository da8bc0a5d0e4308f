use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of all errors
/// raised by the engine. Each kind maps to a stable error code that can be
/// used for programmatic error handling, testing, and external API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    /// Snapshot, collection or audit entry is absent
    NotFound,
    /// Bad cursor, limit, path or collection name, or a withheld confirmation
    Validation,
    /// Archive bytes could not be decoded
    ArchiveCorrupt,
    /// Filesystem failure during create/write/delete
    Io,

    // Integration
    Serialization,
    Persistence,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::ArchiveCorrupt => "ERR_ARCHIVE_CORRUPT",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the context
/// (operation, collection, entity) needed to debug a failure.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    collection: Option<String>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            collection: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add collection context
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Add entity ID context (snapshot id, audit id, artifact name)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the collection context, if any
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Get the entity ID context, if any
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(collection) = &self.collection {
            write!(f, " (collection: {})", collection)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for snapshot, merge and version operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    /// Snapshot id is not in the collection's catalog
    #[error("Snapshot not found: {snapshot_id} in collection {collection}")]
    SnapshotNotFound {
        snapshot_id: String,
        collection: String,
    },

    /// Collection directory does not exist
    #[error("Collection path not found: {path}")]
    CollectionNotFound { path: String },

    /// Audit entry id is unknown
    #[error("Audit entry not found: {entry_id}")]
    AuditEntryNotFound { entry_id: String },

    /// Page size outside 1..=100
    #[error("Invalid limit {limit}: must be between 1 and 100")]
    InvalidLimit { limit: usize },

    /// Pagination cursor does not name a snapshot of the collection
    #[error("Unknown cursor: {cursor}")]
    UnknownCursor { cursor: String },

    /// Path or name failed validation
    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Confirmation was required but consent was withheld
    #[error("cancelled")]
    Cancelled,

    /// Archive bytes are malformed
    #[error("Archive corrupt: {reason}")]
    ArchiveCorrupt { reason: String },

    /// Filesystem failure
    #[error("I/O failure during {op} on {path}: {message}")]
    Io {
        op: String,
        path: String,
        message: String,
    },

    /// Serialization failure
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Catalog or ledger failure
    #[error("Persistence error: {message}")]
    Persistence { message: String },
}

impl VaultError {
    /// Build an `Io` variant from a `std::io::Error`
    pub fn io(op: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        VaultError::Io {
            op: op.to_string(),
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<VaultError> for ExError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::SnapshotNotFound {
                snapshot_id,
                collection,
            } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(snapshot_id)
                .with_collection(collection)
                .with_message("Snapshot not found"),

            VaultError::CollectionNotFound { path } => ExError::new(ExErrorKind::Io)
                .with_entity_id(path)
                .with_message("Collection path not found"),

            VaultError::AuditEntryNotFound { entry_id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_id(entry_id)
                .with_message("Audit entry not found"),

            VaultError::InvalidLimit { limit } => ExError::new(ExErrorKind::Validation)
                .with_message(format!("limit {} out of range 1..=100", limit)),

            VaultError::UnknownCursor { cursor } => ExError::new(ExErrorKind::Validation)
                .with_entity_id(cursor)
                .with_message("Unknown cursor"),

            VaultError::InvalidPath { path, reason } => ExError::new(ExErrorKind::Validation)
                .with_entity_id(path)
                .with_message(reason),

            VaultError::Cancelled => {
                ExError::new(ExErrorKind::Validation).with_message("cancelled")
            }

            VaultError::ArchiveCorrupt { reason } => {
                ExError::new(ExErrorKind::ArchiveCorrupt).with_message(reason)
            }

            VaultError::Io { op, path, message } => ExError::new(ExErrorKind::Io)
                .with_op(op)
                .with_entity_id(path)
                .with_message(message),

            VaultError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            VaultError::Persistence { message } => {
                ExError::new(ExErrorKind::Persistence).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to VaultError
impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization {
            message: err.to_string(),
        }
    }
}
