//! Configuration error types.

use thiserror::Error;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("no exchange section found for venue {0}")]
    MissingExchange(String),

    #[error("venue {venue}: missing required credential {credential}")]
    MissingCredential { venue: String, credential: String },

    #[error("at least one trading pair is required")]
    NoCurrencies,
}
