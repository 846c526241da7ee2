//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when communicating with the remote session server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed before a response arrived.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Server reported the requested resource does not exist.
    ///
    /// Distinguishable from other failures so callers can react to stale
    /// session ids.
    #[error("not found: {0}")]
    NotFound(String),
}
