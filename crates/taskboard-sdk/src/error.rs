//! Error types for task-board API operations, with transience
//! classification for retry decisions upstream.

use thiserror::Error;

/// Errors during task-board API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from the task-board API.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Request to the task-board API timed out.
    #[error("Request timeout")]
    Timeout,

    /// The request was invalid (client error).
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The supplied token was rejected.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The requested list or task does not exist.
    #[error("Resource not found")]
    NotFound,

    /// Failed to parse a JSON response.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Server errors, rate limiting, timeouts and transport failures are
    /// transient; rejected tokens, missing resources and malformed requests
    /// are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::RateLimitExceeded => true,
            Self::Timeout => true,
            Self::InvalidRequest { .. } => false,
            Self::AuthenticationFailed => false,
            Self::NotFound => false,
            Self::JsonError(_) => false,
            Self::HttpClientError(error) => !error.is_builder(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
