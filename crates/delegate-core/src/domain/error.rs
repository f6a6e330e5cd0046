//! Infrastructure error taxonomy.
//!
//! Planning conflicts, missing dependencies and denied spawns are ordinary
//! return values; only configuration and storage problems become errors.

use delegate_state::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for fallible core operations.
pub type Result<T> = std::result::Result<T, DelegateError>;
