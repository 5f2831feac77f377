pub mod config;
pub mod detector;
pub mod error;
pub mod indicators;

pub use config::DetectorConfig;
pub use detector::{IndicatorSnapshot, PatternDetector, PatternRule};
pub use error::{ConfigError, DetectorError};
