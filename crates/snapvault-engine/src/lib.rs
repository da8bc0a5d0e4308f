//! Snapvault Engine - Orchestration layer
//!
//! Coordinates the core merge and drift logic with the on-disk stores:
//! rollbacks with safety snapshots and audit entries, conflict resolution,
//! deployment drift checks, and the `Vault` facade over all of it.

pub mod commands;
pub mod config;
pub mod vault;

pub use commands::resolve::ResolveRequest;
pub use commands::rollback::{RollbackCoordinator, RollbackOptions, SAFETY_SNAPSHOT_MESSAGE};
pub use commands::vault_command::{apply_vault_command, VaultCommand, VaultCommandResult};
pub use config::VaultConfig;
pub use vault::Vault;
