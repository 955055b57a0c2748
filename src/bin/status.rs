//! Prints read-only views of the state document as JSON
//!
//! Takes shared locks only and never creates or resets the document.

use anyhow::Result;
use clap::{Parser, Subcommand};
use paperbot::report::StatusReport;
use paperbot::{Settings, StateStore};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paperbot-status", about = "Inspect the paper trading state document")]
struct Cli {
    /// TOML config file. Defaults to ./paperbot.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the state document location
    #[arg(long)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Component heartbeats
    Health,
    /// Mode, daily P&L, kill switch and latest reasoning
    Status,
    /// Open trades, oldest first
    Trades,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("paperbot=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(state_file) = cli.state_file {
        settings.state_file = state_file;
    }

    let store = StateStore::attach(&settings.state_file, settings.risk.daily_loss_limit);
    let report = StatusReport::load(&store);

    match cli.command {
        Commands::Health => print_json(&report.health()),
        Commands::Status => print_json(&report.status()),
        Commands::Trades => print_json(&report.active_trades()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
