use std::time::Duration;

use crate::{Error, Result, TradingMode};

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_base_url: String,
    pub http_timeout: Duration,

    // Trading
    pub trading_mode: TradingMode,
    pub quote_asset: String,
    pub dust_threshold: f64,
    pub paper_initial_quote: f64,
    pub paper_slippage_bps: f64,

    // Market data
    pub candle_interval: String,
    pub candle_limit: usize,
    pub scan_concurrency: usize,
    pub fetch_retries: u32,

    // Scheduling
    pub cycle_interval: Duration,

    // Audit trail
    pub conversion_log_path: String,

    // Optional detector parameter file (TOML)
    pub detector_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let trading_mode = match required("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        // Public market data needs no credentials, so paper mode runs without them.
        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (required("BINANCE_API_KEY")?, required("BINANCE_SECRET")?),
            TradingMode::Paper => (
                lookup("BINANCE_API_KEY").unwrap_or_default(),
                lookup("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let parsed_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let candle_limit = parsed_u64("CANDLE_LIMIT").unwrap_or(100) as usize;
        if candle_limit == 0 {
            return Err(Error::Config("CANDLE_LIMIT must be positive".into()));
        }

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_base_url: lookup("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            http_timeout: Duration::from_secs(parsed_u64("HTTP_TIMEOUT_SECS").unwrap_or(10)),
            trading_mode,
            quote_asset: lookup("QUOTE_ASSET")
                .map(|v| v.trim().to_uppercase())
                .unwrap_or_else(|| "USDT".to_string()),
            dust_threshold: parsed("DUST_THRESHOLD").unwrap_or(0.0001),
            paper_initial_quote: parsed("PAPER_INITIAL_USDT").unwrap_or(10_000.0),
            paper_slippage_bps: parsed("PAPER_SLIPPAGE_BPS").unwrap_or(10.0),
            candle_interval: lookup("CANDLE_INTERVAL").unwrap_or_else(|| "1h".to_string()),
            candle_limit,
            scan_concurrency: (parsed_u64("SCAN_CONCURRENCY").unwrap_or(1) as usize).max(1),
            fetch_retries: (parsed_u64("FETCH_RETRIES").unwrap_or(3) as u32).max(1),
            cycle_interval: Duration::from_secs(
                parsed_u64("CYCLE_INTERVAL_SECS").unwrap_or(3600),
            ),
            conversion_log_path: lookup("CONVERSION_LOG_PATH")
                .unwrap_or_else(|| "conversion_log.txt".to_string()),
            detector_config_path: lookup("DETECTOR_CONFIG_PATH"),
        })
    }
}
