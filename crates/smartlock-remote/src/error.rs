use std::net::SocketAddr;
use thiserror::Error;

/// Errors from the remote control transport.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Failed to bind to address
    #[error("Failed to bind to {0}")]
    BindFailed(SocketAddr),

    /// Configured bind address does not parse
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Reply could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tokio_util::codec::LinesCodecError> for RemoteError {
    fn from(error: tokio_util::codec::LinesCodecError) -> Self {
        Self::Codec(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
