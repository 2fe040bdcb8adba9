//! Error types for automerge-bot

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the scheduler, pipeline, and their collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Process configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote merge service rejected or failed a call.
    /// Carries the remote error detail verbatim where available.
    #[error("codeup api error: {0}")]
    Codeup(String),

    /// Task store operation failed
    #[error("store error: {0}")]
    Store(String),

    /// A task lookup failed
    #[error("task not found: {0}")]
    TaskNotFound(i64),

    /// Notification delivery failed
    #[error("notify error: {0}")]
    Notify(String),

    /// HTTP transport failure (client side)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}
