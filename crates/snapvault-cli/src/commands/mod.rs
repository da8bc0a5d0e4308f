//! Subcommands and the flags every subcommand shares.

pub mod audit;
pub mod deploy;
pub mod rollback;
pub mod snapshot;

use anyhow::{anyhow, Context};
use clap::Args;
use serde::Serialize;
use snapvault_engine::{Vault, VaultConfig};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root, overriding the config file
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Live root of a collection as NAME=PATH (repeatable)
    #[arg(long = "root", value_name = "NAME=PATH", global = true)]
    pub roots: Vec<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Build the vault from the config file and flag overrides
pub fn open_vault(global: &GlobalArgs) -> anyhow::Result<Vault> {
    let mut config = match &global.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(root) = &global.store_root {
        config.store_root = root.clone();
    }
    for pair in &global.roots {
        let (name, path) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("--root expects NAME=PATH, got '{}'", pair))?;
        config = config.with_collection(name, path);
    }
    Ok(Vault::open(config)?)
}

/// Print as pretty JSON when `--json` is set, otherwise run `human`
pub fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}
