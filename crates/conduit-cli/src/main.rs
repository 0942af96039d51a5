//! `conduit` — a thin terminal client exposing a handful of the caller-API
//! operations (§6.5) as subcommands, for operability and demonstration. The
//! interactive web UI and daemon are out of scope (§1); this binary talks
//! directly to the library crates, one-shot per invocation.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod context;
mod formatter;

use commands::{create_session, delete_session, doctor, list_models, run_turn, servers};
use formatter::OutputFormat;

/// conduit - LLM agent orchestration runtime
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: `pretty` (default) or `json`.
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a saved authentication record (§4.9 `create_session`).
    CreateSession(create_session::CreateSessionArgs),

    /// Delete a saved authentication record (§4.9 `delete_session`).
    DeleteSession(delete_session::DeleteSessionArgs),

    /// List models available to a credential (§4.9 `list_models`).
    ListModels(list_models::ListModelsArgs),

    /// Run one ReAct turn to completion (§4.10 `run_turn`).
    RunTurn(run_turn::RunTurnArgs),

    /// Show configured MCP servers (§6.2 `mcp_settings.json`).
    Servers(servers::ServersArgs),

    /// Run basic health checks.
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let log_config = conduit_telemetry::LogConfig::new(level);
    if let Err(e) = conduit_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {e}");
    }

    let format = OutputFormat::parse(&cli.format);

    match cli.command {
        Commands::CreateSession(args) => create_session::run(args).await,
        Commands::DeleteSession(args) => delete_session::run(args).await,
        Commands::ListModels(args) => list_models::run(args, format).await,
        Commands::RunTurn(args) => run_turn::run(args, format).await,
        Commands::Servers(args) => servers::run(args, format),
        Commands::Doctor => doctor::run().await,
    }
}
