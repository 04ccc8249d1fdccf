//! Error types for talking to the GitHub API.

use thiserror::Error;

/// Errors that can occur while fetching a GitHub resource.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, IO).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// GitHub answered with a non-success status.
    #[error("GitHub API error ({status}): {message}")]
    Response { status: u16, message: String },

    /// The body was not the JSON shape we expected.
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid configuration, such as an API origin that cannot be a base URL.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FetchError {
    /// Build a response error from a status and whatever body text came back.
    ///
    /// The body wins when it is non-empty, then the canonical reason phrase,
    /// then the bare status code.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if !body.trim().is_empty() {
            body.to_string()
        } else if let Some(reason) = status.canonical_reason() {
            reason.to_string()
        } else {
            status.as_str().to_string()
        };

        Self::Response {
            status: status.as_u16(),
            message,
        }
    }

    /// The user-facing part of the error, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Transport(e) => e.to_string(),
            Self::Response { message, .. } => message.clone(),
            Self::Decode(e) => format!("Failed to parse response: {e}"),
            Self::Config(message) => message.clone(),
        }
    }
}

/// Result type for GitHub API operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// What a failed fetch leaves behind in its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
}

impl From<&FetchError> for ErrorInfo {
    fn from(err: &FetchError) -> Self {
        Self {
            message: err.message(),
        }
    }
}
