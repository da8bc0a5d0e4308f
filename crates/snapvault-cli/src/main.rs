//! Snapvault CLI
//!
//! Command-line interface for snapvault

use clap::{Parser, Subcommand};
use snapvault_core::logging_facility;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "snapvault")]
#[command(about = "Snapvault - snapshots, intelligent rollback and drift detection", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Snapshot operations
    Snapshot(commands::snapshot::SnapshotArgs),
    /// Rollback analysis, rollbacks and conflict resolution
    Rollback(commands::rollback::RollbackArgs),
    /// Rollback audit history
    Audit(commands::audit::AuditArgs),
    /// Deployment registration, drift checks and version graphs
    Deploy(commands::deploy::DeployArgs),
}

fn main() {
    let cli = Cli::parse();
    let json = cli.global.json;

    let result = commands::open_vault(&cli.global).and_then(|vault| {
        logging_facility::init(vault.config().log_profile);
        match cli.command {
            Commands::Snapshot(args) => commands::snapshot::execute(&vault, args, json),
            Commands::Rollback(args) => commands::rollback::execute(&vault, args, json),
            Commands::Audit(args) => commands::audit::execute(&vault, args, json),
            Commands::Deploy(args) => commands::deploy::execute(&vault, args, json),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
