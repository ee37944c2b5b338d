//! Alpaca-specific error types.

use thiserror::Error;

use crate::application::ports::{BrokerError, MarketDataError};

/// Errors from the Alpaca adapters.
#[derive(Debug, Error, Clone)]
pub enum AlpacaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Resource not found.
    #[error("Not found: {path}")]
    NotFound {
        /// The request path that returned 404.
        path: String,
    },
}

impl From<AlpacaError> for BrokerError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::Http(msg) | AlpacaError::Network(msg) | AlpacaError::JsonParse(msg) => {
                Self::ConnectionError { message: msg }
            }
            AlpacaError::Api { code, message } => Self::Unknown {
                message: format!("{code}: {message}"),
            },
            AlpacaError::OrderRejected(reason) => Self::OrderRejected { reason },
            AlpacaError::AuthenticationFailed => Self::AuthenticationFailed,
            AlpacaError::RateLimited { .. } => Self::RateLimited,
            AlpacaError::MaxRetriesExceeded { attempts } => Self::ConnectionError {
                message: format!("Max retries exceeded after {attempts} attempts"),
            },
            AlpacaError::NotFound { path } => Self::Unknown {
                message: format!("Not found: {path}"),
            },
        }
    }
}

impl From<AlpacaError> for MarketDataError {
    fn from(err: AlpacaError) -> Self {
        match err {
            AlpacaError::JsonParse(message) => Self::MalformedResponse { message },
            other => Self::ConnectionError {
                message: other.to_string(),
            },
        }
    }
}
