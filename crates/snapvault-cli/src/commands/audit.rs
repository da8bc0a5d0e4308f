//! Audit commands
//!
//! Usage: snapvault audit <history|show> --collection <NAME>

use super::emit;
use anyhow::anyhow;
use clap::{Args, Subcommand};
use snapvault_core::model::AuditEntry;
use snapvault_engine::Vault;

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Rollback history, newest first
    History(HistoryArgs),
    /// One audit entry
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long)]
    pub collection: String,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(long)]
    pub collection: String,

    pub entry_id: String,
}

pub fn execute(vault: &Vault, args: AuditArgs, json: bool) -> anyhow::Result<()> {
    match args.command {
        AuditCommand::History(a) => {
            let entries = vault.get_audit_history(&a.collection, a.limit)?;
            emit(json, &entries, |entries| {
                for e in entries {
                    println!(
                        "{}  {:<11} -> {}  restored={} merged={} pending={} {}",
                        e.timestamp.to_rfc3339(),
                        e.operation_type.as_str(),
                        e.target_snapshot_id,
                        e.files_restored,
                        e.files_merged,
                        e.conflicts_pending,
                        if e.success { "ok" } else { "FAILED" }
                    );
                }
            })
        }
        AuditCommand::Show(a) => match vault.get_audit_entry(&a.collection, &a.entry_id)? {
            Some(entry) => emit(json, &entry, print_entry),
            None => Err(anyhow!("audit entry {} not found", a.entry_id)),
        },
    }
}

fn print_entry(e: &AuditEntry) {
    println!("id: {}", e.id);
    println!("  timestamp: {}", e.timestamp.to_rfc3339());
    println!("  operation: {}", e.operation_type);
    println!(
        "  source_snapshot_id: {}",
        e.source_snapshot_id.as_deref().unwrap_or("-")
    );
    println!("  target_snapshot_id: {}", e.target_snapshot_id);
    println!("  files_restored: {}", e.files_restored);
    println!("  files_merged: {}", e.files_merged);
    println!("  conflicts_pending: {}", e.conflicts_pending);
    println!("  preserve_changes: {}", e.preserve_changes_enabled);
    if let Some(paths) = &e.selective_paths {
        println!("  selective_paths: {}", paths.join(", "));
    }
    println!("  success: {}", e.success);
    if let Some(error) = &e.error {
        println!("  error: {}", error);
    }
}
