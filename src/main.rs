use clap::Parser;
use paperbot::events::TracingEventSink;
use paperbot::{Result, Settings, TradingEngine};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "paperbot", about = "Paper trading agent over a synthetic market feed")]
struct Args {
    /// TOML config file. Defaults to ./paperbot.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the state document location
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(state_file) = args.state_file {
        settings.state_file = state_file;
    }

    tracing::info!("🚀 Paper trading agent starting");
    tracing::info!("📊 Configuration:");
    tracing::info!("  State file: {}", settings.state_file.display());
    tracing::info!("  Symbols: {}", settings.symbols.join(", "));
    tracing::info!("  Min confidence: {:.0}%", settings.entry.min_confidence * 100.0);
    tracing::info!("  Max active trades: {}", settings.entry.max_active_trades);
    tracing::info!("  Capital budget: {:.2}", settings.entry.capital_budget);
    tracing::info!("  Daily loss limit: {:.2}", settings.risk.daily_loss_limit);
    tracing::info!("  Forced exit: {}", settings.risk.force_exit_time);
    tracing::info!("  Oscillator: {:?}", settings.strategy.oscillator);

    let mut engine = TradingEngine::from_settings(&settings, Arc::new(TracingEventSink))?;

    if args.once {
        let summary = engine.tick()?;
        tracing::info!(
            "Tick done: {} proposals, {} entries, {} exits",
            summary.proposals,
            summary.entries.len(),
            summary.exits.len()
        );
        return Ok(());
    }

    tracing::info!("[SYSTEM READY] Paper trading live");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        _ = engine.run() => {}
    }

    tracing::info!("👋 Paper trading agent stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("paperbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
