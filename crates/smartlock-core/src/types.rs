use crate::{
    Result,
    constants::{
        BYTES_PER_SAMPLE, CAPTURE_TOKEN_FORMAT, CAPTURE_TOKEN_LENGTH, DEFAULT_AUDIO_DURATION_SECS,
        DEFAULT_SAMPLE_RATE, EMBEDDING_DIMENSIONS,
    },
    error::Error,
};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an unlock decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMethod {
    /// Automatic unlock after a confirmed face match.
    Face,
    /// Unlock requested over the remote control channel.
    Remote,
}

impl AccessMethod {
    /// Stored representation (`face` / `remote`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "face" => Ok(Self::Face),
            "remote" => Ok(Self::Remote),
            other => Err(Error::InvalidAccessMethod(other.to_string())),
        }
    }
}

/// Timestamp token that correlates one motion episode's artifacts.
///
/// The video file, the audio file, the merged recording and the access log
/// entry of an episode all carry the same token (`YYYYmmdd_HHMMSS`, local time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptureToken(String);

impl CaptureToken {
    /// Token for the current local time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Token for an arbitrary point in time.
    #[must_use]
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(at.format(CAPTURE_TOKEN_FORMAT).to_string())
    }

    /// Parse and validate a formatted token.
    ///
    /// # Errors
    /// Returns `Error::InvalidCaptureToken` if the string is not a valid
    /// `YYYYmmdd_HHMMSS` timestamp.
    pub fn parse(token: &str) -> Result<Self> {
        if token.len() != CAPTURE_TOKEN_LENGTH {
            return Err(Error::InvalidCaptureToken(format!(
                "{token}: expected {CAPTURE_TOKEN_LENGTH} characters"
            )));
        }
        NaiveDateTime::parse_from_str(token, CAPTURE_TOKEN_FORMAT)
            .map_err(|e| Error::InvalidCaptureToken(format!("{token}: {e}")))?;
        Ok(Self(token.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the episode's raw video recording.
    #[must_use]
    pub fn video_file_name(&self) -> String {
        format!("video_{}.mp4", self.0)
    }

    /// File name of the episode's audio recording.
    #[must_use]
    pub fn audio_file_name(&self) -> String {
        format!("audio_{}.wav", self.0)
    }

    /// File name of the merged audio/video recording.
    #[must_use]
    pub fn merged_file_name(&self) -> String {
        format!("{}.mp4", self.0)
    }
}

impl fmt::Display for CaptureToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CaptureToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CaptureToken::parse(s)
    }
}

/// Fixed-length face embedding produced by the recognition capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEncoding(Vec<f64>);

impl FaceEncoding {
    /// Create an encoding, validating its dimensionality.
    ///
    /// # Errors
    /// Returns `Error::InvalidEncoding` if the vector does not have
    /// [`EMBEDDING_DIMENSIONS`] finite components.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.len() != EMBEDDING_DIMENSIONS {
            return Err(Error::InvalidEncoding(format!(
                "expected {EMBEDDING_DIMENSIONS} components, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidEncoding(
                "components must be finite".to_string(),
            ));
        }
        Ok(Self(values))
    }

    /// Decode an encoding stored as little-endian `f64` words.
    ///
    /// # Errors
    /// Returns `Error::InvalidEncoding` if the byte length does not match.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        const WORD: usize = std::mem::size_of::<f64>();
        if bytes.len() != EMBEDDING_DIMENSIONS * WORD {
            return Err(Error::InvalidEncoding(format!(
                "expected {} bytes, got {}",
                EMBEDDING_DIMENSIONS * WORD,
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(WORD)
            .map(|chunk| {
                let mut word = [0u8; WORD];
                word.copy_from_slice(chunk);
                f64::from_le_bytes(word)
            })
            .collect();
        Self::new(values)
    }

    /// Encode as little-endian `f64` words for storage.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Euclidean distance to another encoding.
    #[must_use]
    pub fn euclidean_distance(&self, other: &FaceEncoding) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<[f64; EMBEDDING_DIMENSIONS]> for FaceEncoding {
    fn from(values: [f64; EMBEDDING_DIMENSIONS]) -> Self {
        Self(values.to_vec())
    }
}

/// Size of one audio capture agreed with the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioBudget {
    pub sample_rate: u32,
    pub duration_secs: u32,
}

impl AudioBudget {
    #[must_use]
    pub fn new(sample_rate: u32, duration_secs: u32) -> Self {
        Self {
            sample_rate,
            duration_secs,
        }
    }

    /// Number of samples in one capture.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_rate as usize * self.duration_secs as usize
    }

    /// Number of payload bytes that completes one capture.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.sample_count() * BYTES_PER_SAMPLE
    }
}

impl Default for AudioBudget {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_AUDIO_DURATION_SECS)
    }
}
