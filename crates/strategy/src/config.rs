use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pattern detector parameters. Every field defaults to the stock rule set,
/// so an empty file (or no file at all) gives the standard behaviour.
///
/// Example `config/detector.toml`:
/// ```toml
/// rsi_period = 14
/// fast_ma = 5
/// slow_ma = 20
/// rsi_oversold = 35.0
/// hammer_shadow_factor = 2.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub rsi_period: usize,
    /// Window of the fast simple moving average.
    pub fast_ma: usize,
    /// Window of the slow simple moving average.
    pub slow_ma: usize,
    /// RSI strictly below this value is oversold.
    pub rsi_oversold: f64,
    /// Lower shadow must be strictly longer than this multiple of the body.
    pub hammer_shadow_factor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            fast_ma: 5,
            slow_ma: 20,
            rsi_oversold: 35.0,
            hammer_shadow_factor: 2.0,
        }
    }
}

impl DetectorConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let cfg: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsi_period < 2 {
            return Err(ConfigError::Invalid("rsi_period must be >= 2".into()));
        }
        if self.fast_ma == 0 || self.slow_ma == 0 {
            return Err(ConfigError::Invalid("moving average windows must be positive".into()));
        }
        Ok(())
    }

    /// Shortest candle window every rule can be evaluated on.
    pub fn min_candles(&self) -> usize {
        self.slow_ma.max(self.fast_ma).max(self.rsi_period + 1)
    }
}
