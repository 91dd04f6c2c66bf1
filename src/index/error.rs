//! Index error types

use crate::curve::CurveError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during spatial index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Caller passed a coordinate or rectangle the index cannot hold
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The skip search broke one of its own invariants
    #[error("Internal consistency failure: {0}")]
    Internal(#[from] CurveError),

    /// Storage layer error, passed through unchanged
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Index configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
