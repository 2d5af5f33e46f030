mod cli;
mod config;
mod mcp;
mod vault;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::vault::Vault;

#[derive(Parser)]
#[command(name = "notevault", about = "Obsidian vault MCP server for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (stdio transport).
    Serve {
        /// Path to config file (TOML).
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Verify the vault is usable before running 'serve'. Exits 0 if all pass.
    Check {
        /// Path to config file (TOML).
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print a vault summary (note counts, config, recent notes).
    Info {
        /// Path to config file (TOML).
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the MCP transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config: config_path } => {
            let config = cli::load_config(config_path)?;
            let vault = Vault::open(&config.vault_path())?;
            mcp::serve(Arc::new(vault)).await?;
        }
        Commands::Check { config: config_path } => {
            let config = cli::load_config(config_path)?;
            cli::run_check(&config)?;
        }
        Commands::Info { config: config_path } => {
            let config = cli::load_config(config_path)?;
            cli::run_info(&config)?;
        }
    }

    Ok(())
}
