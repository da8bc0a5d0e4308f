//! Command orchestration layer.
//!
//! Provides high-level command functions that coordinate between
//! core domain logic and persistence layer.

pub mod modifications;
pub mod resolve;
pub mod rollback;
pub mod vault_command;
