use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Domain value errors
    #[error("Invalid face encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid capture token: {0}")]
    InvalidCaptureToken(String),

    #[error("Invalid access method: {0}")]
    InvalidAccessMethod(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
