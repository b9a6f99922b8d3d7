//! Error types for snarky-core

use thiserror::Error;

/// Main error type for snarky-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error {status}: {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an empty response")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} does not support {capability}")]
    Unsupported {
        provider: &'static str,
        capability: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for snarky-core
pub type Result<T> = std::result::Result<T, Error>;
