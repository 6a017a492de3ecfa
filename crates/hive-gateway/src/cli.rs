//! Command-line entry points (`hive serve`, `hive config check`).

use clap::{Parser, Subcommand};
use hive_core::config::HiveConfig;

#[derive(Parser)]
#[command(name = "hive", about = "Personal AI-assistant daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway: HTTP surface, scheduler, reminder sweeper.
    Serve,
    /// Configuration utilities.
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Load the effective config (file + env overrides) and print it.
    Check,
}

pub fn run_config_check(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = HiveConfig::load(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
