//! Rollback commands
//!
//! Without `--yes` a confirmed rollback only proceeds when the safety
//! analysis reports no conflicts; simple rollbacks always need `--yes`.

use super::emit;
use anyhow::{anyhow, Context};
use clap::{Args, Subcommand};
use snapvault_core::consent::{AlwaysConsent, RollbackConsent, SafeOnlyConsent};
use snapvault_core::model::{ConflictRecord, ConflictType, ResolutionStrategy, RollbackResult};
use snapvault_engine::{
    apply_vault_command, ResolveRequest, RollbackOptions, Vault, VaultCommand, VaultCommandResult,
};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RollbackArgs {
    #[command(subcommand)]
    pub command: RollbackCommand,
}

#[derive(Debug, Subcommand)]
pub enum RollbackCommand {
    /// Preview an intelligent rollback
    Analyze(TargetArgs),
    /// Intelligent rollback: safety snapshot, three-way merge, audit entry
    Run(RunArgs),
    /// Destructive full restore without merge or safety snapshot
    Simple(SimpleArgs),
    /// Resolve one conflict reported by a rollback
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    #[arg(long)]
    pub collection: String,

    /// Snapshot to roll back to
    pub snapshot_id: String,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Overwrite local edits instead of merging them
    #[arg(long)]
    pub no_preserve: bool,

    /// Only write these paths (repeatable)
    #[arg(long = "path")]
    pub paths: Vec<String>,

    /// Approve even when the analysis reports conflicts
    #[arg(long)]
    pub yes: bool,

    /// Skip the consent check entirely
    #[arg(long)]
    pub no_confirm: bool,
}

#[derive(Debug, Args)]
pub struct SimpleArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[arg(long)]
    pub collection: String,

    /// Conflicting path, relative to the collection root
    #[arg(long)]
    pub file: String,

    /// use_local, use_remote, use_base or custom
    #[arg(long)]
    pub strategy: ResolutionStrategy,

    /// Snapshot that was rolled back to (read by use_remote)
    #[arg(long)]
    pub target: Option<String>,

    /// Merge base snapshot (read by use_base)
    #[arg(long)]
    pub base: Option<String>,

    /// File whose bytes are written by custom
    #[arg(long)]
    pub content_file: Option<PathBuf>,
}

pub fn execute(vault: &Vault, args: RollbackArgs, json: bool) -> anyhow::Result<()> {
    match args.command {
        RollbackCommand::Analyze(a) => {
            let analysis = vault.analyze_rollback_safety(&a.snapshot_id, &a.collection)?;
            emit(json, &analysis, |an| {
                println!("Rollback analysis for {}:", an.target_snapshot_id);
                println!("  is_safe: {}", an.is_safe);
                println!("  local_changes_detected: {}", an.local_changes_detected);
                print_paths("safe to restore", &an.files_safe_to_restore);
                print_paths("local edits kept", &an.files_to_merge);
                print_paths("conflicts", &an.files_with_conflicts);
                for w in &an.warnings {
                    println!("  warning: {}", w);
                }
            })
        }
        RollbackCommand::Run(a) => {
            let options = RollbackOptions {
                preserve_changes: !a.no_preserve,
                selective_paths: (!a.paths.is_empty()).then_some(a.paths),
                confirm: !a.no_confirm,
            };
            let consent: &dyn RollbackConsent = if a.yes {
                &AlwaysConsent
            } else {
                &SafeOnlyConsent
            };
            let cmd = VaultCommand::IntelligentRollback {
                collection: a.target.collection,
                snapshot_id: a.target.snapshot_id,
                options,
            };
            report(json, apply_vault_command(cmd, vault, consent)?)
        }
        RollbackCommand::Simple(a) => {
            if !a.yes {
                return Err(anyhow!("simple rollback overwrites the live tree; pass --yes"));
            }
            let cmd = VaultCommand::Rollback {
                collection: a.target.collection,
                snapshot_id: a.target.snapshot_id,
                confirm: true,
            };
            report(json, apply_vault_command(cmd, vault, &AlwaysConsent)?)
        }
        RollbackCommand::Resolve(a) => {
            match a.strategy {
                ResolutionStrategy::UseRemote if a.target.is_none() => {
                    return Err(anyhow!("use_remote needs --target"));
                }
                ResolutionStrategy::UseBase if a.base.is_none() => {
                    return Err(anyhow!("use_base needs --base"));
                }
                _ => {}
            }
            let custom_content = match &a.content_file {
                Some(path) => Some(
                    std::fs::read(path)
                        .with_context(|| format!("reading {}", path.display()))?,
                ),
                None => None,
            };
            let conflict = ConflictRecord {
                file_path: a.file,
                conflict_type: ConflictType::Content,
                base_content: None,
                local_content: None,
                target_content: None,
                auto_mergeable: false,
                resolution_strategy: None,
                is_binary: false,
                is_symlink: false,
            };
            let request = ResolveRequest {
                conflict,
                strategy: a.strategy,
                custom_content,
                target_snapshot_id: a.target,
                base_snapshot_id: a.base,
            };
            let cmd = VaultCommand::ResolveConflict {
                collection: a.collection,
                request,
            };
            match apply_vault_command(cmd, vault, &AlwaysConsent)? {
                VaultCommandResult::ConflictResolved(record) => emit(json, &record, |r| {
                    println!("Resolved {}", r.file_path);
                }),
                other => Err(anyhow!("unexpected command result: {:?}", other)),
            }
        }
    }
}

fn report(json: bool, outcome: VaultCommandResult) -> anyhow::Result<()> {
    let VaultCommandResult::RolledBack(result) = outcome else {
        return Err(anyhow!("unexpected command result: {:?}", outcome));
    };
    emit(json, &result, print_result)?;
    match &result.error {
        Some(error) => Err(anyhow!("rollback stopped part way: {}", error)),
        None => Ok(()),
    }
}

fn print_result(r: &RollbackResult) {
    println!("Rolled back to {}:", r.snapshot_id);
    if let Some(safety) = &r.safety_snapshot_id {
        println!("  safety_snapshot_id: {}", safety);
    }
    println!("  files_restored: {}", r.files_restored);
    println!("  files_merged: {}", r.files_merged);
    if !r.conflicts.is_empty() {
        println!("  pending conflicts ({}):", r.conflicts.len());
        for c in &r.conflicts {
            println!("    {} [{}]", c.file_path, c.conflict_type);
        }
    }
}

fn print_paths(label: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    println!("  {} ({}):", label, paths.len());
    for p in paths {
        println!("    {}", p);
    }
}
