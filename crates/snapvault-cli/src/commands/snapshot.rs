//! Snapshot commands
//!
//! Usage: snapvault snapshot <create|list|get|delete|prune|restore|verify> --collection <NAME> ...

use super::emit;
use anyhow::anyhow;
use clap::{Args, Subcommand};
use snapvault_core::consent::AlwaysConsent;
use snapvault_core::model::Snapshot;
use snapvault_engine::{apply_vault_command, Vault, VaultCommand, VaultCommandResult};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Archive the live collection
    Create(CreateArgs),
    /// Newest-first page of snapshots
    List(ListArgs),
    Get(IdArgs),
    Delete(IdArgs),
    /// Keep the N newest snapshots
    Prune(PruneArgs),
    /// Extract a snapshot into a directory
    Restore(RestoreArgs),
    /// Re-read an archive and check it against the catalog
    Verify(IdArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub collection: String,

    #[arg(short, long, default_value = "")]
    pub message: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub collection: String,

    /// Page size, 1..=100 (defaults to the configured page size)
    #[arg(long)]
    pub limit: Option<usize>,

    /// `next_cursor` of the previous page
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(long)]
    pub collection: String,

    /// Snapshot id
    pub snapshot_id: String,
}

#[derive(Debug, Args)]
pub struct PruneArgs {
    #[arg(long)]
    pub collection: String,

    #[arg(long)]
    pub keep: usize,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    #[arg(long)]
    pub collection: String,

    pub snapshot_id: String,

    /// Destination directory; existing paths not in the snapshot are kept
    #[arg(long)]
    pub dest: PathBuf,
}

pub fn execute(vault: &Vault, args: SnapshotArgs, json: bool) -> anyhow::Result<()> {
    match args.command {
        SnapshotCommand::Create(a) => {
            let cmd = VaultCommand::CreateSnapshot {
                collection: a.collection,
                message: a.message,
            };
            match apply_vault_command(cmd, vault, &AlwaysConsent)? {
                VaultCommandResult::SnapshotCreated(s) => emit(json, &s, |s| {
                    println!("Snapshot created:");
                    print_snapshot(s);
                }),
                other => Err(anyhow!("unexpected command result: {:?}", other)),
            }
        }
        SnapshotCommand::List(a) => {
            let page = vault.list_snapshots(&a.collection, a.limit, a.cursor.as_deref())?;
            emit(json, &page, |page| {
                for s in &page.snapshots {
                    println!("{}  {:>4} artifacts  {}", s.id, s.artifact_count, s.message);
                }
                if let Some(cursor) = &page.next_cursor {
                    println!("next_cursor: {}", cursor);
                }
            })
        }
        SnapshotCommand::Get(a) => match vault.get_snapshot(&a.snapshot_id, &a.collection)? {
            Some(s) => emit(json, &s, print_snapshot),
            None => Err(anyhow!(
                "snapshot {} not found in collection {}",
                a.snapshot_id,
                a.collection
            )),
        },
        SnapshotCommand::Delete(a) => {
            let cmd = VaultCommand::DeleteSnapshot {
                collection: a.collection,
                snapshot_id: a.snapshot_id,
            };
            apply_vault_command(cmd, vault, &AlwaysConsent)?;
            println!("Snapshot deleted");
            Ok(())
        }
        SnapshotCommand::Prune(a) => {
            let cmd = VaultCommand::Prune {
                collection: a.collection,
                keep_count: a.keep,
            };
            match apply_vault_command(cmd, vault, &AlwaysConsent)? {
                VaultCommandResult::Pruned(deleted) => emit(json, &deleted, |deleted| {
                    println!("Pruned {} snapshot(s)", deleted.len());
                    for s in deleted {
                        println!("  {}", s.id);
                    }
                }),
                other => Err(anyhow!("unexpected command result: {:?}", other)),
            }
        }
        SnapshotCommand::Restore(a) => {
            let written = vault.restore_snapshot(&a.snapshot_id, &a.collection, &a.dest)?;
            println!("Restored {} file(s) into {}", written, a.dest.display());
            Ok(())
        }
        SnapshotCommand::Verify(a) => {
            let v = vault.verify_snapshot(&a.snapshot_id, &a.collection)?;
            println!("snapshot_id: {}", v.snapshot_id);
            println!("  digest_matches: {}", v.digest_matches);
            println!("  decodable: {}", v.decodable);
            println!("  content_matches: {}", v.content_matches);
            println!("  entries: {}", v.entry_count);
            if v.is_valid() {
                Ok(())
            } else {
                Err(anyhow!("snapshot {} failed verification", v.snapshot_id))
            }
        }
    }
}

fn print_snapshot(s: &Snapshot) {
    println!("  snapshot_id: {}", s.id);
    println!("  timestamp: {}", s.timestamp.to_rfc3339());
    println!("  message: {}", s.message);
    println!("  artifacts: {}", s.artifact_count);
    println!("  content_hash: {}", s.content_hash);
    println!("  size_bytes: {}", s.size_bytes);
}
