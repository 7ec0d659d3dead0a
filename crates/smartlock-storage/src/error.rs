use thiserror::Error;

/// Failures of the persistence gateway.
///
/// None of these are fatal to the daemon. The orchestrator logs them and
/// carries on; an unlock that was already sent is never rescinded.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored column (method name, embedding blob) did not decode.
    #[error("Invalid stored value: {0}")]
    Domain(#[from] smartlock_core::Error),

    /// Rejected before reaching the database, e.g. a blank identity name.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("DateTime error: {0}")]
    DateTime(String),

    /// Unusable database path or directory.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
