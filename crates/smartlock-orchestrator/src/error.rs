//! Error types for the orchestrator.
//!
//! The orchestrator never dies on these: link, capture, persistence and
//! recognition failures are logged where they happen and the loop moves on.
//! They surface as values only at the edges (enrollment, remote commands,
//! startup and shutdown).

use smartlock_hardware::HardwareError;
use smartlock_storage::StorageError;
use std::path::PathBuf;

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Serial link, camera or recognizer failure.
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Persistence Gateway failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Artifact file error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// External merge tool failed.
    #[error("Merge failed: {message}")]
    MergeFailed { message: String },

    /// Enrollment image contained no face.
    #[error("No face found in {}", path.display())]
    NoFaceFound { path: PathBuf },

    /// A background task panicked or could not be joined.
    #[error("Task failed: {message}")]
    TaskFailed { message: String },
}

impl OrchestratorError {
    /// Create a new merge failure.
    pub fn merge_failed(message: impl Into<String>) -> Self {
        Self::MergeFailed {
            message: message.into(),
        }
    }

    /// Create a new task failure.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for OrchestratorError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::task_failed(error.to_string())
    }
}
