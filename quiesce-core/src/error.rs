use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to walk {path:?}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("Failed to stat {path:?}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Notification rejected with status {status}")]
    NotifyStatus { status: u16 },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WatchError>;
