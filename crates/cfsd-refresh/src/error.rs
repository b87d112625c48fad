//! Refresh engine error types.
//!
//! Per-item failures inside a cycle never surface here; they are logged
//! and replaced with empty values. Only failures that leave the cycle
//! with nothing to publish are errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for publishing.
pub type PublishResult<T> = Result<T, PublishError>;

/// The snapshot could not be published.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors that stop the refresh controller.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh cycle {cycle} could not publish: {source}")]
    Publish {
        cycle: u64,
        #[source]
        source: PublishError,
    },
}
