//! Edge daemon configuration.
//!
//! Configuration is loaded from a TOML file. Every section and every field
//! has a default, so an empty file yields a runnable configuration.
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//! baud_rate = 230400
//!
//! [audio]
//! sample_rate = 8000
//! duration_secs = 10
//!
//! [capture]
//! directory = "captures"
//! output_directory = "videos"
//!
//! [database]
//! path = "smart_lock.db"
//!
//! [remote]
//! bind_addr = "0.0.0.0:3000"
//! ```

use crate::{
    Result,
    constants::{
        DEFAULT_AUDIO_DURATION_SECS, DEFAULT_AUDIO_TIMEOUT_SECS, DEFAULT_BAUD_RATE,
        DEFAULT_CAPTURE_DIR, DEFAULT_DATABASE_PATH, DEFAULT_DOWNSAMPLE_FACTOR,
        DEFAULT_FFMPEG_BINARY, DEFAULT_KNOWN_FACES_RELOAD_SECS, DEFAULT_NORMALIZATION_DIVISOR,
        DEFAULT_OUTPUT_DIR,
        DEFAULT_REMOTE_BIND_ADDR, DEFAULT_SAMPLE_RATE, DEFAULT_SERIAL_PORT,
        DEFAULT_SERIAL_READ_TIMEOUT_MS, DEFAULT_VIDEO_DURATION_SECS,
    },
    error::Error,
    types::AudioBudget,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Top-level configuration for the edge daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub serial: SerialConfig,
    pub audio: AudioConfig,
    pub capture: CaptureConfig,
    pub recognition: RecognitionConfig,
    pub database: DatabaseSettings,
    pub remote: RemoteConfig,
}

impl EdgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`EdgeConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the string does not parse or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(Error::Config("serial.port must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be positive".into()));
        }
        if self.audio.sample_rate == 0 || self.audio.duration_secs == 0 {
            return Err(Error::Config(
                "audio.sample_rate and audio.duration_secs must be positive".into(),
            ));
        }
        if !(self.audio.normalization_divisor.is_finite() && self.audio.normalization_divisor > 0.0)
        {
            return Err(Error::Config(
                "audio.normalization_divisor must be a positive number".into(),
            ));
        }
        if self.capture.video_duration_secs == 0 {
            return Err(Error::Config(
                "capture.video_duration_secs must be positive".into(),
            ));
        }
        if self.recognition.downsample_factor == 0 {
            return Err(Error::Config(
                "recognition.downsample_factor must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if self.remote.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(Error::Config(format!(
                "remote.bind_addr is not a socket address: {}",
                self.remote.bind_addr
            )));
        }
        Ok(())
    }
}

/// Serial link to the lock microcontroller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl SerialConfig {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_SERIAL_READ_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub duration_secs: u32,
    pub normalization_divisor: f64,
}

impl AudioConfig {
    #[must_use]
    pub fn budget(&self) -> AudioBudget {
        AudioBudget::new(self.sample_rate, self.duration_secs)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration_secs: DEFAULT_AUDIO_DURATION_SECS,
            normalization_divisor: DEFAULT_NORMALIZATION_DIVISOR,
        }
    }
}

/// Artifact locations and recording windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Intermediate video and audio files.
    pub directory: PathBuf,
    /// Merged recordings.
    pub output_directory: PathBuf,
    pub video_duration_secs: u64,
    /// Audio watchdog; `0` disables it.
    pub audio_timeout_secs: u64,
    pub ffmpeg: String,
}

impl CaptureConfig {
    #[must_use]
    pub fn video_duration(&self) -> Duration {
        Duration::from_secs(self.video_duration_secs)
    }

    /// `None` when the watchdog is disabled.
    #[must_use]
    pub fn audio_timeout(&self) -> Option<Duration> {
        (self.audio_timeout_secs > 0).then(|| Duration::from_secs(self.audio_timeout_secs))
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_CAPTURE_DIR),
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
            video_duration_secs: DEFAULT_VIDEO_DURATION_SECS,
            audio_timeout_secs: DEFAULT_AUDIO_TIMEOUT_SECS,
            ffmpeg: DEFAULT_FFMPEG_BINARY.to_string(),
        }
    }
}

/// Which recognition and camera implementation the daemon wires in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionBackend {
    /// In-process mocks, for bench setups without a camera.
    #[default]
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub downsample_factor: u32,
    pub backend: RecognitionBackend,
    /// Periodic known-face reload; `0` disables it.
    pub reload_interval_secs: u64,
}

impl RecognitionConfig {
    /// `None` when periodic reloads are disabled.
    #[must_use]
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            downsample_factor: DEFAULT_DOWNSAMPLE_FACTOR,
            backend: RecognitionBackend::default(),
            reload_interval_secs: DEFAULT_KNOWN_FACES_RELOAD_SECS,
        }
    }
}

/// Database location, named to avoid clashing with the storage crate's
/// pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub bind_addr: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_REMOTE_BIND_ADDR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = EdgeConfig::from_toml("").unwrap();
        assert_eq!(config, EdgeConfig::default());
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 230_400);
        assert_eq!(config.audio.budget().byte_len(), 160_000);
        assert_eq!(config.capture.audio_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.recognition.reload_interval(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_reload_interval_zero_disables() {
        let config = EdgeConfig::from_toml("[recognition]\nreload_interval_secs = 0\n").unwrap();
        assert_eq!(config.recognition.reload_interval(), None);
    }

    #[test]
    fn test_partial_override() {
        let config = EdgeConfig::from_toml(
            r#"
            [serial]
            port = "/dev/ttyUSB0"

            [audio]
            sample_rate = 16000
            normalization_divisor = 65535.0

            [capture]
            audio_timeout_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.audio.budget().byte_len(), 16_000 * 10 * 2);
        assert_eq!(config.capture.audio_timeout(), None);
        assert_eq!(config.capture.directory, PathBuf::from("captures"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let original = EdgeConfig::default();
        let text = original.to_toml().unwrap();
        let parsed = EdgeConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[remote]\nbind_addr = \"127.0.0.1:4000\"").unwrap();
        let config = EdgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.remote.bind_addr, "127.0.0.1:4000");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EdgeConfig::from_file("/nonexistent/smartlock.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EdgeConfig::from_toml("[audio]\nsample_rate = 0").is_err());
        assert!(EdgeConfig::from_toml("[audio]\nnormalization_divisor = 0.0").is_err());
        assert!(EdgeConfig::from_toml("[recognition]\ndownsample_factor = 0").is_err());
        assert!(EdgeConfig::from_toml("[remote]\nbind_addr = \"not-an-addr\"").is_err());
        assert!(EdgeConfig::from_toml("[serial]\nport = \"\"").is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = EdgeConfig::from_toml("[recognition]\nbackend = \"cuda\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }
}
