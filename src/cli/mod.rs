//! Command-line interface for mfsync
//!
//! Uses clap for argument parsing with a structured command pattern:
//! each subcommand is an Args struct plus a Command struct with an
//! async `execute`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

use crate::data_paths::{DataPaths, DEFAULT_DATA_DIR};
use crate::logging::{self, LoggingConfig};
use commands::balances::{BalancesArgs, BalancesCommand};
use commands::sync::{SyncArgs, SyncCommand};
use commands::version::{VersionArgs, VersionCommand};

#[derive(Parser)]
#[command(name = "mfsync")]
#[command(version)]
#[command(about = "Sync Binance balances into Money Forward as JPY valuations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory path (default: ./data)
    #[arg(long, global = true, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the balance sync against the ledger
    Sync(SyncArgs),

    /// Fetch balances and valuations without touching the ledger
    Balances(BalancesArgs),

    /// Show version information
    Version(VersionArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let data_paths = DataPaths::new(&self.data_dir);

        // Ensure all directories exist
        data_paths.ensure_directories()?;

        logging::init_logging(LoggingConfig::new(data_paths.clone(), self.verbose))?;

        match self.command {
            Commands::Sync(args) => SyncCommand::new(args).execute(data_paths).await,
            Commands::Balances(args) => BalancesCommand::new(args).execute(data_paths).await,
            Commands::Version(args) => VersionCommand::new(args).execute(data_paths).await,
        }
    }
}
