use serde::Deserialize;
use thiserror::Error;

/// Non-2xx response from the identification service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Build from a status code and the raw response body.
    ///
    /// `{"error": ...}` bodies give the message, then `{"message": ...}`;
    /// any other non-empty body is used verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error.or(parsed.message));
        let message = match parsed {
            Some(message) => message,
            None if !body.trim().is_empty() => body.trim().to_string(),
            None => format!("Request failed with status {}", status),
        };
        Self { status, message }
    }
}

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The server ended the stream with an `error` chunk, or the stream
    /// ended before any result arrived.
    #[error("Identification failed: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
