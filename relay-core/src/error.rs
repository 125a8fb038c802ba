//! Error types for the relay.
//!
//! [`RelayError`] is the top-level error; [`StoreError`] is what store implementations return.

use thiserror::Error;

/// Top-level error for the relay (storage, delivery transport, config, malformed events, IO).
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Errors produced by store implementations (SQLite, in-memory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Result type for core operations; uses [`RelayError`].
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type returned by store traits.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
