use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::modules::media::model::EncodeStatus;

/// Errors surfaced to callers of `EncodeQueue::enqueue`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid video path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("failed to record job status: {0}")]
    Status(#[from] StatusError),

    #[error("encode queue is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("no status record for video {0}")]
    NotFound(String),

    #[error("a status record for video {0} already exists")]
    Duplicate(String),

    #[error("video {name}: cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: EncodeStatus,
        to: EncodeStatus,
    },

    #[error("unknown encode status {0:?}")]
    InvalidStatus(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure reported by an encoder. The display text is what ends up in the
/// status record's `message`.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("probe failed: {0}")]
    Probe(String),

    #[error("{tool} {message}")]
    Tool { tool: String, message: String },

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}: {1}")]
    Missing(&'static str, std::env::VarError),

    #[error("invalid table name {0:?}")]
    InvalidTableName(String),
}
