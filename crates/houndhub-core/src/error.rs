//! HoundHub error types.

use thiserror::Error;

/// Errors that can occur across the HoundHub engine.
#[derive(Debug, Error)]
pub enum HoundHubError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Workflow error: {0}")]
    Workflow(String),
}

/// Result type alias for HoundHub operations.
pub type Result<T> = std::result::Result<T, HoundHubError>;
