//! dlvctl - drive a headless Delve debugger from the terminal
//!
//! Spawns (or connects to) a delve JSON-RPC server and offers an
//! interactive prompt for breakpoints, stepping and evaluation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dlv_remote::commands::Commands;
use dlv_remote::common::{config::Config, logging};
use dlv_remote::cli;

#[derive(Parser)]
#[command(name = "dlvctl", about = "Remote control for a headless Delve debugger")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Dropped on return, flushing buffered file logs
    let _log_guard = logging::init(config.logging.file);

    match cli::dispatch(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
