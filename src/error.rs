use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Request Budget Errors
    #[error("Requested {requested} tokens exceeds bucket capacity {capacity}")]
    ExceedsCapacity {
        requested: u32,
        capacity: u32,
    },

    #[error("Daily hard limit reached: {limit} actions per 24h")]
    BudgetExceeded {
        limit: usize,
    },

    #[error("Request budget unavailable for endpoint {endpoint} (weight {weight})")]
    BudgetUnavailable {
        endpoint: String,
        weight: u32,
    },

    // Provider Errors
    #[error("Provider {source_id} unavailable: {reason}")]
    ProviderUnavailable {
        source_id: String,
        reason: String,
    },

    #[error("All providers exhausted after {cycles} cycles: {last_error}")]
    AllProvidersExhausted {
        cycles: u32,
        last_error: String,
    },

    #[error("No providers configured")]
    NoProviders,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown data source: {0}")]
    UnknownSource(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Streaming Errors
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Reconnect attempts exhausted after {attempts} failed attempts")]
    ReconnectExhausted {
        attempts: u32,
    },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // Data Errors
    #[error("Deserialization failed: {0}")]
    DeserializationError(String),

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Terminal errors end a fetch cycle immediately instead of failing over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::BudgetExceeded { .. } | Error::ExceedsCapacity { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}
