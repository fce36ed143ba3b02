//! # sg-cli
//!
//! Command-line interface for Spend Guard.
//!
//! - `sg policy create/show/list/update/assign-wallet/delete` — manage policies
//! - `sg execute` — submit one agent action request through the enforcer
//! - `sg log list/spend/verify` — inspect the action log and derived spend
//!
//! Trades go through the simulated executor; no custody layer is contacted.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sg_enforcer::EnforcerConfig;
use tracing_subscriber::EnvFilter;

/// Spend Guard CLI — enforce spending policies for delegated agents.
#[derive(Parser)]
#[command(name = "sg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage spending policies.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Evaluate and (if permitted) execute one action request.
    Execute(commands::execute::ExecuteArgs),
    /// Inspect the action log.
    Log {
        #[command(subcommand)]
        command: commands::log::LogCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries command output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sg_enforcer=info".parse()?)
                .add_directive("sg_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = EnforcerConfig::load_for_project(&project_root)?;
    tracing::debug!(root = %project_root.display(), "config loaded");

    match &cli.command {
        Commands::Policy { command } => commands::policy::execute(command, &config),
        Commands::Execute(args) => commands::execute::execute(args, &config).await,
        Commands::Log { command } => commands::log::execute(command, &config),
    }
}
