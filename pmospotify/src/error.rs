//! Error types for the Spotify Web API client.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Errors returned by [`SpotifyClient`](crate::SpotifyClient) operations.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Underlying HTTP transport failure (connection, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The access token is expired, revoked or lacks the required scope.
    #[error("unauthorized: token expired or insufficient scope")]
    Unauthorized,

    /// The requested resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The API rejected the request because of rate limiting.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Any other non-success response from the API.
    #[error("Spotify API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The configured base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SpotifyError {
    /// Maps an HTTP status code and error message to a typed error.
    ///
    /// The Web API wraps failures in a `{"error": {"status", "message"}}`
    /// envelope; callers extract the message before calling this.
    pub fn from_status_code(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => SpotifyError::Unauthorized,
            404 => SpotifyError::NotFound(message.into()),
            429 => SpotifyError::RateLimited,
            _ => SpotifyError::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// True when the error means the token must be refreshed externally.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SpotifyError::Unauthorized)
    }
}
