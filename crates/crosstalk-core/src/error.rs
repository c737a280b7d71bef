//! Error types for crosstalk.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrosstalkError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
