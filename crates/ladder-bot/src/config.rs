//! Application configuration.
//!
//! One TOML file with `[feed]`, `[exchange]`, `[engine]` and `[telemetry]`
//! sections, overridable per key through `LADDER__SECTION__KEY`
//! environment variables.

use std::path::Path;
use std::time::Duration;

use ladder_core::RetryPolicy;
use ladder_exchange::PaperConfig;
use ladder_feed::DEFAULT_BASE_URL;
use ladder_mm::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable holding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "LADDER_CONFIG";

/// Prefix for per-key environment overrides (`LADDER__ENGINE__LEVELS=7`).
const ENV_PREFIX: &str = "LADDER";
const ENV_SEPARATOR: &str = "__";

/// Reference price feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// REST root of the reference venue.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Attempts per price lookup.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay (ms), doubled per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling (ms).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Poll interval of the `price` command (seconds).
    #[serde(default = "default_follow_update_sec")]
    pub follow_update_sec: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_follow_update_sec() -> u64 {
    5
}

impl FeedConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn follow_update(&self) -> Duration {
        Duration::from_secs(self.follow_update_sec)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            follow_update_sec: default_follow_update_sec(),
        }
    }
}

/// Execution venue selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Adapter to use. Only `"paper"` ships with this binary.
    #[serde(default = "default_exchange_kind")]
    pub kind: String,
    /// Starting balances for the paper venue.
    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_exchange_kind() -> String {
    "paper".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            kind: default_exchange_kind(),
            paper: PaperConfig::default(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Session summary interval (seconds). Also logged at shutdown.
    #[serde(default = "default_summary_interval_sec")]
    pub summary_interval_sec: u64,
}

fn default_summary_interval_sec() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            summary_interval_sec: default_summary_interval_sec(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load `path` layered under `LADDER__*` environment overrides.
    ///
    /// A missing file is not an error: defaults plus environment apply.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut builder = config::Config::builder();
        if Path::new(path).exists() {
            info!(path, "Loading configuration file");
            builder = builder.add_source(config::File::new(path, config::FileFormat::Toml));
        } else {
            warn!(path, "Config file not found, using defaults");
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration path: CLI argument, then `LADDER_CONFIG`,
    /// then the default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn validate(&self) -> AppResult<()> {
        self.engine.validate()?;
        if self.feed.max_attempts == 0 {
            return Err(AppError::Config("feed.max_attempts must be >= 1".to_string()));
        }
        if self.feed.follow_update_sec == 0 {
            return Err(AppError::Config(
                "feed.follow_update_sec must be non-zero".to_string(),
            ));
        }
        if self.telemetry.summary_interval_sec == 0 {
            return Err(AppError::Config(
                "telemetry.summary_interval_sec must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_core::Side;
    use ladder_mm::{DistributionMode, EngineMode, SideBudget};
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.exchange.kind, "paper");
        assert_eq!(config.feed.max_attempts, 5);
        assert_eq!(config.engine.mode, EngineMode::Single(Side::Bid));
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[feed]
base_url = "http://localhost:8080/"
max_attempts = 3

[exchange]
kind = "paper"

[exchange.paper]
quote_balance = "25000"
base_balance = "0.5"

[engine]
ticker = "btcusdt"
mode = "dual"
levels = 7
step_percent = "0.25"
distribution_mode = "pyramid"

[engine.bid_budget]
mode = "fixed"
amount = "2000"

[engine.ask_budget]
mode = "ratio"
ratio = "0.4"

[engine.jitter]
enabled = true
min_percent = "-0.05"
max_percent = "0.05"

[telemetry]
summary_interval_sec = 600
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.feed.max_attempts, 3);
        assert_eq!(config.feed.backoff_base_ms, 500);
        assert_eq!(config.exchange.paper.quote_balance, dec!(25000));
        assert_eq!(config.engine.mode, EngineMode::Dual);
        assert_eq!(config.engine.levels, 7);
        assert_eq!(config.engine.distribution_mode, DistributionMode::Pyramid);
        assert_eq!(config.engine.bid_budget, SideBudget::Fixed { amount: dec!(2000) });
        assert_eq!(config.engine.ask_budget, SideBudget::Ratio { ratio: dec!(0.4) });
        assert!(config.engine.jitter.enabled);
        assert_eq!(config.telemetry.summary_interval_sec, 600);
        // Untouched engine keys keep their defaults.
        assert_eq!(config.engine.rebalance_interval_sec, 60);
    }

    #[test]
    fn test_invalid_engine_rejected() {
        let toml_str = r#"
[engine]
levels = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Engine(_))));
    }

    #[test]
    fn test_feed_retry_policy() {
        let policy = FeedConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_load_file_with_env_override() {
        let path = std::env::temp_dir().join(format!("ladder-bot-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[engine]\nticker = \"ETH\"\nlevels = 4\n\n[exchange.paper]\nquote_balance = \"500\"\n",
        )
        .unwrap();
        std::env::set_var("LADDER__ENGINE__LEVELS", "9");

        let loaded = AppConfig::load(path.to_str().unwrap());
        std::env::remove_var("LADDER__ENGINE__LEVELS");
        let _ = std::fs::remove_file(&path);

        let config = loaded.unwrap();
        assert_eq!(config.engine.ticker, "ETH");
        assert_eq!(config.engine.levels, 9);
        assert_eq!(config.exchange.paper.quote_balance, dec!(500));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/ladder.toml").unwrap();
        assert_eq!(config.exchange.kind, "paper");
    }
}
