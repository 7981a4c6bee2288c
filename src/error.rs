//! Error types for the payment confirmation engine
//!
//! Only `ConfirmationError::MissingParameters` and `InvalidParameters` ever
//! reach the user. Gateway and store failures inside a running session are
//! logged and absorbed by the worker.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "cache")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("no pending payment parameters were found")]
    MissingParameters,

    #[error("invalid payment parameters: {0}")]
    InvalidParameters(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl ConfirmationError {
    /// Fatal session errors are shown to the user with a way back to the catalog
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConfirmationError::MissingParameters | ConfirmationError::InvalidParameters(_)
        )
    }
}
