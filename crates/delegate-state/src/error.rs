//! Error types for delegate-state

use thiserror::Error;

/// Errors raised by a [`crate::CounterStore`] backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Could not reach or authenticate against the backing store
    #[error("counter store connection failed: {0}")]
    Connection(String),

    /// The store answered but the operation failed
    #[error("counter store backend error: {0}")]
    Backend(String),

    /// The store is deliberately or temporarily unavailable
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_error_displays_reason() {
        let err = StorageError::Unavailable("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
