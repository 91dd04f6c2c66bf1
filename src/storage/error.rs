//! Storage error types
//!
//! Defines all errors the ordered key-value backends can raise.

use thiserror::Error;

/// Errors that can occur in a key-value backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite reported an error other than contention
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Transaction could not run because another writer holds the store
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// A stored key could not be decoded
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Conflict(err.to_string())
            }
            _ => StorageError::Sqlite(err),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::Lock(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Corruption("truncated tuple".to_string());
        assert_eq!(err.to_string(), "Corrupt data: truncated tuple");

        let err = StorageError::Conflict("database is locked".to_string());
        assert_eq!(err.to_string(), "Transaction conflict: database is locked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_busy_maps_to_conflict() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(matches!(StorageError::from(busy), StorageError::Conflict(_)));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(StorageError::from(other), StorageError::Sqlite(_)));
    }
}
