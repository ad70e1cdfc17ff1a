//! Application wiring.
//!
//! Builds the reference feed, the execution adapter and the engine from
//! `AppConfig`, runs the engine until Ctrl+C or a fatal error, and logs a
//! session summary periodically and at shutdown.

use std::sync::Arc;
use std::time::Duration;

use ladder_exchange::{DynExchange, PaperExchange};
use ladder_feed::{
    normalize_ticker, reference_symbol, BinancePriceFeed, DynPriceFeed, ReferencePriceFeed,
};
use ladder_mm::{quoted_price, Engine};
use ladder_telemetry::SessionStatsReporter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Main application.
pub struct Application {
    config: AppConfig,
    feed: DynPriceFeed,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let feed = BinancePriceFeed::new(&config.feed.base_url, config.feed.retry_policy())?;
        Ok(Self {
            config,
            feed: Arc::new(feed),
        })
    }

    /// Execution adapter for the configured exchange kind.
    fn build_exchange(&self) -> AppResult<DynExchange> {
        match self.config.exchange.kind.trim().to_ascii_lowercase().as_str() {
            "paper" => {
                let paper = &self.config.exchange.paper;
                info!(
                    quote_balance = %paper.quote_balance,
                    base_balance = %paper.base_balance,
                    "Using paper exchange"
                );
                Ok(Arc::new(PaperExchange::new(paper)))
            }
            other => Err(AppError::UnsupportedExchange(other.to_string())),
        }
    }

    /// Run the market maker until Ctrl+C or a fatal engine error.
    pub async fn run(self) -> AppResult<()> {
        let exchange = self.build_exchange()?;
        let mut engine = Engine::new(self.config.engine.clone(), Arc::clone(&self.feed), exchange)?;
        let stats = Arc::new(SessionStatsReporter::new(engine.ticker()));

        let cancel = CancellationToken::new();
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            signal_token.cancel();
        });

        let summary_token = cancel.clone();
        let summary_stats = Arc::clone(&stats);
        let summary_every = Duration::from_secs(self.config.telemetry.summary_interval_sec);
        let summary_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(summary_every);
            // First tick fires immediately.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = summary_token.cancelled() => break,
                    _ = interval.tick() => summary_stats.output_summary(),
                }
            }
        });

        info!(ticker = %engine.ticker(), symbol = %engine.symbol(), "Starting market maker");
        let result = engine.run(cancel.clone()).await;

        cancel.cancel();
        if let Err(e) = summary_handle.await {
            warn!(error = %e, "Summary task did not finish cleanly");
        }

        info!("Final session summary:");
        stats.output_summary();

        result.map_err(AppError::from)
    }

    /// Log the reference price for `ticker` until Ctrl+C.
    ///
    /// With jitter enabled, also logs a sample jittered target.
    pub async fn watch_price(&self, ticker: &str) -> AppResult<()> {
        let symbol = reference_symbol(ticker);
        let jitter = self.config.engine.jitter;
        let every = self.config.feed.follow_update();
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(every);

        info!(
            ticker = %normalize_ticker(ticker),
            %symbol,
            update_sec = every.as_secs(),
            "Watching reference price"
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.feed.get_price(&symbol).await {
                        Ok(price) if jitter.enabled => {
                            let adjustment = jitter.draw(&mut rng);
                            let target = quoted_price(price, adjustment);
                            info!(%symbol, %price, %adjustment, %target, "Reference price");
                        }
                        Ok(price) => info!(%symbol, %price, "Reference price"),
                        Err(e) => warn!(%symbol, error = %e, "Reference price unavailable"),
                    }
                }
            }
        }
    }
}
