//! Errors from the serial link, the camera and the recognition capability.
//!
//! None of these stop the daemon. The orchestrator logs them and keeps
//! serving; only [`HardwareError::Disconnected`] ends the serial reader.

pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device went away. Retrying the same handle will not help.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Bytes or images the device layer could not interpret.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    #[error("Capture error: {message}")]
    CaptureFailed { message: String },

    /// Model not loaded, or the backend refused the request.
    #[error("Recognition unavailable: {message}")]
    RecognitionUnavailable { message: String },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureFailed {
            message: message.into(),
        }
    }

    pub fn recognition_unavailable(message: impl Into<String>) -> Self {
        Self::RecognitionUnavailable {
            message: message.into(),
        }
    }

    /// Whether the device is gone and the caller should stop polling it.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected { .. } => true,
            Self::Serial(e) => matches!(e.kind(), serialport::ErrorKind::NoDevice),
            _ => false,
        }
    }
}
