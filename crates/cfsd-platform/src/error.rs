//! Platform access error types.

use thiserror::Error;

/// Result type alias for platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors returned by a `PlatformApi` implementation.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}
