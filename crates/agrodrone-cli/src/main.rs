//! AgroDrone CLI - Command-line access to the offline-first sync subsystem
//!
//! Provides commands for:
//! - Running a full sync or an initial download
//! - Inspecting pending changes and per-table watermarks
//! - Reading and editing the records of one table
//! - Viewing and validating configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    config::ConfigCommand,
    pull::PullCommand,
    records::{DeleteCommand, ListCommand, PutCommand},
    status::StatusCommand,
    sync::SyncCommand,
};
use context::GlobalOptions;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "agrodrone",
    version,
    about = "Offline-first sync for AgroDrone field data"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Treat the device as offline and never contact the backend
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload local changes, then download remote changes
    Sync(SyncCommand),
    /// Download the signed-in user's data into the local store
    Pull(PullCommand),
    /// Show pending changes and per-table sync state
    Status(StatusCommand),
    /// List the records of a table
    List(ListCommand),
    /// Create or update a record
    Put(PutCommand),
    /// Delete a record
    Delete(DeleteCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let options = GlobalOptions {
        config: cli.config.map(Into::into),
        offline: cli.offline,
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&options, format).await,
        Commands::Pull(cmd) => cmd.execute(&options, format).await,
        Commands::Status(cmd) => cmd.execute(&options, format).await,
        Commands::List(cmd) => cmd.execute(&options, format).await,
        Commands::Put(cmd) => cmd.execute(&options, format).await,
        Commands::Delete(cmd) => cmd.execute(&options, format).await,
        Commands::Config(cmd) => cmd.execute(&options, format).await,
    }
}
