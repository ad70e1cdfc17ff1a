//! Ladder market maker - Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use ladder_bot::{AppConfig, Application};

/// Ladder market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via LADDER_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the market maker (default)
    Run,
    /// Log the reference price for a ticker
    Price {
        /// Base asset, e.g. BTC (a USDT suffix is accepted)
        #[arg(short, long)]
        ticker: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    ladder_telemetry::init_logging()?;

    info!("Starting ladder-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    let config = AppConfig::load(&config_path)?;
    info!(
        config_path = %config_path,
        ticker = %config.engine.ticker,
        mode = %config.engine.mode,
        exchange = %config.exchange.kind,
        "Configuration loaded"
    );

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            let app = Application::new(config)?;
            app.run().await?;
        }
        Command::Price { ticker } => {
            let ticker = ticker.unwrap_or_else(|| config.engine.ticker.clone());
            let app = Application::new(config)?;
            app.watch_price(&ticker).await?;
        }
    }

    Ok(())
}
