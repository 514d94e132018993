//! Error types for quota monitoring.

use thiserror::Error;

/// Result type alias for quota operations.
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Errors that can occur while monitoring folder quotas.
#[derive(Error, Debug)]
pub enum QuotaError {
    /// Quota is not a positive, finite number of gigabytes.
    #[error("invalid quota: {0} GB (must be positive and finite)")]
    InvalidQuota(f64),

    /// Folder not found.
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// Path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Folder is not registered for watching.
    #[error("folder not registered: {0}")]
    NotRegistered(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking walk task failed to run to completion.
    #[error("walk task failed: {0}")]
    WalkTask(#[from] tokio::task::JoinError),

    /// Channel send error.
    #[error("channel error: failed to send event")]
    ChannelSend,
}
