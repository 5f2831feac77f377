use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("need at least {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read detector config at '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse detector config at '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid detector config: {0}")]
    Invalid(String),
}
