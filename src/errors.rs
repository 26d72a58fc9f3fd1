//! Error types for hashtag-graph.

use thiserror::Error;

/// A record that could not be read as a post object.
#[derive(Debug, Error)]
#[error("malformed record: {0}")]
pub struct ParseError(#[from] pub serde_json::Error);

/// Top-level error type for graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// I/O error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The extraction worker pool could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Snapshot or config file (de)serialization error.
    #[error("serde error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// User-supplied input that cannot be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
