//! Error types for the store module.

use thiserror::Error;

use envseal_core::{CoreError, ValidationError};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope file could not be parsed or written.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Environment or key not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Refused to overwrite an existing record.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Name cannot be used as a file name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] ValidationError),

    /// Stored key material is unusable.
    #[error("invalid key: {0}")]
    Key(#[from] CoreError),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
