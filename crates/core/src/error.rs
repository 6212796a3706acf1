//! Error types for Perch.

use thiserror::Error;

/// Result type alias using Perch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Perch.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    // =========================================================================
    // Model Gateway Errors
    // =========================================================================
    #[error("Model provider error: {0}")]
    ModelProvider(String),

    #[error("All providers unavailable: {0}")]
    AllProvidersUnavailable(String),

    #[error("No completion provider configured")]
    NoProviders,

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    #[error("Failed to parse {source_label} response: {message}")]
    Parse {
        source_label: String,
        message: String,
    },

    #[error("No usable candidates: {0}")]
    NoCandidates(String),

    // =========================================================================
    // Adapter Errors
    // =========================================================================
    #[error("{adapter} request failed: {message}")]
    Adapter { adapter: String, message: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a model provider error.
    pub fn model_provider(msg: impl Into<String>) -> Self {
        Self::ModelProvider(msg.into())
    }

    /// Create a parse error tagged with the source it came from.
    pub fn parse(source_label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_label: source_label.into(),
            message: message.into(),
        }
    }

    /// Create an adapter error.
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a missing configuration error.
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig(key.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error came from a timed-out call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
