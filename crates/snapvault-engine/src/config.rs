//! Vault configuration loaded from TOML.
//!
//! ```toml
//! store_root = ".snapvault"
//! default_list_limit = 50
//! log_profile = "development"
//! compression_level = 6
//!
//! [collections]
//! skills = "/home/me/.skills"
//! ```

#![allow(clippy::result_large_err)]

use serde::Deserialize;
use snapvault_core::errors::{ExError, ExErrorKind};
use snapvault_core::logging_facility::Profile;
use snapvault_store::errors::{io_error_at, Result};
use snapvault_store::paths::validate_collection_name;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_ROOT: &str = ".snapvault";
pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Where catalogs, archives, audit history and the version ledger live
    pub store_root: PathBuf,
    /// Page size used by `list_snapshots` when the caller passes none
    pub default_list_limit: usize,
    pub log_profile: Profile,
    /// gzip level for new archives, 0..=9
    pub compression_level: u32,
    /// Live filesystem root of each named collection
    pub collections: BTreeMap<String, PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            default_list_limit: DEFAULT_LIST_LIMIT,
            log_profile: Profile::Development,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            collections: BTreeMap::new(),
        }
    }
}

impl VaultConfig {
    /// Read and validate a TOML config file.
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Serialization` when it is not
    /// valid TOML for this shape, `Validation` for out-of-range values.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_error_at("load_config", path, e))?;
        Self::from_toml(&raw).map_err(|e| e.with_entity_id(path.display().to_string()))
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    ///
    /// `Serialization` for malformed TOML, `Validation` for bad values.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: VaultConfig = toml::from_str(raw).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("load_config")
                .with_message(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.default_list_limit) {
            return Err(invalid(format!(
                "default_list_limit {} out of range 1..=100",
                self.default_list_limit
            )));
        }
        if self.compression_level > 9 {
            return Err(invalid(format!(
                "compression_level {} out of range 0..=9",
                self.compression_level
            )));
        }
        if self.store_root.as_os_str().is_empty() {
            return Err(invalid("store_root must not be empty"));
        }
        for name in self.collections.keys() {
            validate_collection_name(name).map_err(|e| e.with_op("load_config"))?;
        }
        Ok(())
    }

    /// Register or replace the live root of a collection
    pub fn with_collection(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.collections.insert(name.into(), root.into());
        self
    }
}

fn invalid(message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Validation)
        .with_op("load_config")
        .with_message(message)
}
