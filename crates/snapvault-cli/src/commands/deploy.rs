//! Deployment commands
//!
//! Usage: snapvault deploy <register|check|graph|record-version> ...

use super::emit;
use anyhow::{anyhow, Context};
use clap::{Args, Subcommand};
use snapvault_core::consent::AlwaysConsent;
use snapvault_core::hash::{ContentHash, ContentHasher};
use snapvault_core::model::{DeploymentRecord, VersionGraph, VersionGraphNode};
use snapvault_engine::{apply_vault_command, Vault, VaultCommand, VaultCommandResult};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DeployArgs {
    #[command(subcommand)]
    pub command: DeployCommand,
}

#[derive(Debug, Subcommand)]
pub enum DeployCommand {
    /// Record a deployed copy of an artifact
    Register(RegisterArgs),
    /// Re-hash registered deployments and report drift
    Check(CheckArgs),
    /// Collection version and its deployments
    Graph(ArtifactArgs),
    /// Hash an artifact in a collection into the version ledger
    RecordVersion(RecordVersionArgs),
}

#[derive(Debug, Args)]
pub struct ArtifactArgs {
    #[arg(long)]
    pub artifact: String,

    #[arg(long = "type", default_value = "skill")]
    pub artifact_type: String,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub artifact: ArtifactArgs,

    #[arg(long)]
    pub location: PathBuf,

    /// Hash at deployment time (defaults to hashing the location now)
    #[arg(long)]
    pub hash: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Only check deployments of this artifact
    #[arg(long)]
    pub artifact: Option<String>,
}

#[derive(Debug, Args)]
pub struct RecordVersionArgs {
    #[arg(long)]
    pub collection: String,

    #[command(flatten)]
    pub artifact: ArtifactArgs,
}

pub fn execute(vault: &Vault, args: DeployArgs, json: bool) -> anyhow::Result<()> {
    match args.command {
        DeployCommand::Register(a) => {
            let deployed_hash = match a.hash {
                Some(hex) => ContentHash::from_hex(hex),
                None => ContentHasher::new()
                    .hash(&a.location)
                    .map_err(|e| anyhow!("{}", e))
                    .with_context(|| format!("hashing {}", a.location.display()))?,
            };
            let record = DeploymentRecord {
                artifact_name: a.artifact.artifact,
                artifact_type: a.artifact.artifact_type,
                deployed_hash,
                location: a.location.display().to_string(),
            };
            version_result(
                json,
                apply_vault_command(VaultCommand::RegisterDeployment(record), vault, &AlwaysConsent)?,
            )
        }
        DeployCommand::Check(a) => {
            let deployments: Vec<DeploymentRecord> = vault
                .known_deployments()?
                .into_iter()
                .filter(|d| a.artifact.as_ref().map_or(true, |name| &d.artifact_name == name))
                .collect();
            let statuses = vault.check_project_modifications(&deployments)?;
            emit(json, &statuses, |statuses| {
                for s in statuses {
                    let state = match s.modification_detected_at {
                        Some(at) if s.is_modified => format!("MODIFIED since {}", at.to_rfc3339()),
                        _ if s.is_modified => "MODIFIED".to_string(),
                        _ => "clean".to_string(),
                    };
                    println!(
                        "{} ({}) at {}: {}",
                        s.deployment.artifact_name,
                        s.deployment.artifact_type,
                        s.deployment.location,
                        state
                    );
                }
            })
        }
        DeployCommand::Graph(a) => {
            let graph = vault.get_version_graph(&a.artifact, &a.artifact_type)?;
            emit(json, &graph, print_graph)
        }
        DeployCommand::RecordVersion(a) => {
            let cmd = VaultCommand::RecordArtifactVersion {
                collection: a.collection,
                artifact_name: a.artifact.artifact,
                artifact_type: a.artifact.artifact_type,
            };
            version_result(json, apply_vault_command(cmd, vault, &AlwaysConsent)?)
        }
    }
}

fn version_result(json: bool, outcome: VaultCommandResult) -> anyhow::Result<()> {
    let VaultCommandResult::VersionRecorded(version) = outcome else {
        return Err(anyhow!("unexpected command result: {:?}", outcome));
    };
    emit(json, &version, |v| {
        println!(
            "{} ({}) {} at {}",
            v.artifact_name,
            v.artifact_type,
            v.content_hash,
            v.location
        );
    })
}

fn print_graph(graph: &VersionGraph) {
    println!("{} ({})", graph.artifact_name, graph.artifact_type);
    match &graph.root {
        Some(root) => print_node(root, 1),
        None => println!("  (no collection version recorded)"),
    }
    if !graph.orphaned_nodes.is_empty() {
        println!("  orphaned:");
        for node in &graph.orphaned_nodes {
            print_node(node, 2);
        }
    }
    println!(
        "  deployments={} modified={} orphaned={}",
        graph.statistics.total_deployments,
        graph.statistics.modified_count,
        graph.statistics.orphaned_count
    );
}

fn print_node(node: &VersionGraphNode, depth: usize) {
    println!(
        "{}{} {}{}",
        "  ".repeat(depth),
        node.version.location,
        node.version.content_hash,
        if node.is_modified { " (modified)" } else { "" }
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
