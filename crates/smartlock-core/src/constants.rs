//! Wire-level and runtime constants for the smart lock edge orchestrator.
//!
//! The serial contract with the lock microcontroller has no length prefix and
//! no checksum. Framing relies on two literal markers and a fixed audio sample
//! budget agreed with the firmware, so every value in the "Serial Wire
//! Contract" section must match the firmware build exactly.
//!
//! ```text
//! MCU -> Pi   <SMART_LOCK_MOTION>
//! Pi  -> MCU  Audio START\n
//! MCU -> Pi   <SMART_LOCK_AUDIO><raw u16 LE PCM ... sample_rate * secs * 2 bytes>
//! Pi  -> MCU  Audio STOP\n
//! Pi  -> MCU  unlock | lock
//! ```
//!
//! # Usage
//!
//! ```
//! use smartlock_core::constants::*;
//!
//! assert_eq!(MOTION_MARKER, b"<SMART_LOCK_MOTION>");
//! assert_eq!(
//!     DEFAULT_SAMPLE_RATE as usize * DEFAULT_AUDIO_DURATION_SECS as usize * BYTES_PER_SAMPLE,
//!     160_000
//! );
//! ```

// ============================================================================
// Serial Wire Contract
// ============================================================================

/// Inbound marker sent by the microcontroller when its PIR sensor fires.
pub const MOTION_MARKER: &[u8] = b"<SMART_LOCK_MOTION>";

/// Inbound marker that precedes the raw audio stream.
///
/// Every byte after this marker is PCM payload until the sample budget is
/// reached; payload bytes are never interpreted as framing.
pub const AUDIO_MARKER: &[u8] = b"<SMART_LOCK_AUDIO>";

/// Opening byte of a bracketed marker token.
pub const MARKER_OPEN: u8 = b'<';

/// Closing byte of a bracketed marker token.
pub const MARKER_CLOSE: u8 = b'>';

/// Length of the longest known marker.
///
/// A pending `<...` prefix longer than this can never complete into a known
/// marker and is discarded.
pub const MAX_MARKER_LENGTH: usize = if MOTION_MARKER.len() > AUDIO_MARKER.len() {
    MOTION_MARKER.len()
} else {
    AUDIO_MARKER.len()
};

/// Outbound command that releases the lock.
pub const CMD_UNLOCK: &[u8] = b"unlock";

/// Outbound command that engages the lock.
pub const CMD_LOCK: &[u8] = b"lock";

/// Outbound command asking the microcontroller to start streaming audio.
pub const CMD_AUDIO_START: &[u8] = b"Audio START\n";

/// Outbound command asking the microcontroller to stop streaming audio.
pub const CMD_AUDIO_STOP: &[u8] = b"Audio STOP\n";

/// Default serial device on the Raspberry Pi.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";

/// Default serial baud rate expected by the firmware.
pub const DEFAULT_BAUD_RATE: u32 = 230_400;

/// Default blocking read timeout for the serial reader thread, in milliseconds.
///
/// Bounds how long shutdown waits for the reader to observe cancellation.
pub const DEFAULT_SERIAL_READ_TIMEOUT_MS: u64 = 100;

// ============================================================================
// Audio
// ============================================================================

/// Microphone sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 8_000;

/// Length of one audio capture in seconds.
pub const DEFAULT_AUDIO_DURATION_SECS: u32 = 10;

/// Bytes per PCM sample (unsigned 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Divisor used to normalize raw samples into `[-1, 1]`.
///
/// The firmware's ADC path was calibrated against `1023` (a 10-bit range)
/// even though samples travel as 16-bit words. Kept as the default until the
/// hardware sample width is confirmed; see [`FULL_SCALE_U16_DIVISOR`].
pub const DEFAULT_NORMALIZATION_DIVISOR: f64 = 1023.0;

/// Full-scale divisor for genuine 16-bit unsigned samples.
pub const FULL_SCALE_U16_DIVISOR: f64 = 65535.0;

/// Seconds the decoder may wait in the audio state before the episode is aborted.
///
/// `0` disables the watchdog.
pub const DEFAULT_AUDIO_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Capture
// ============================================================================

/// `chrono` format string for capture tokens (`20250127_143000`).
pub const CAPTURE_TOKEN_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Length of a formatted capture token.
pub const CAPTURE_TOKEN_LENGTH: usize = 15;

/// Length of the motion-triggered video recording window in seconds.
pub const DEFAULT_VIDEO_DURATION_SECS: u64 = 10;

/// Directory for per-episode intermediate artifacts.
pub const DEFAULT_CAPTURE_DIR: &str = "captures";

/// Directory for merged audio/video recordings.
pub const DEFAULT_OUTPUT_DIR: &str = "videos";

/// Default merge tool.
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";

// ============================================================================
// Recognition
// ============================================================================

/// Number of components in a face encoding.
pub const EMBEDDING_DIMENSIONS: usize = 128;

/// Frame downsampling factor applied before face detection.
pub const DEFAULT_DOWNSAMPLE_FACTOR: u32 = 5;

/// Euclidean distance under which two encodings are the same face.
///
/// This is the conventional tolerance for 128-d dlib encodings; the
/// recognizer capability may use its own threshold.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.6;

/// Interval at which a running daemon re-reads enrolled faces.
///
/// Picks up enrollments made by another process against the same database.
pub const DEFAULT_KNOWN_FACES_RELOAD_SECS: u64 = 60;

// ============================================================================
// Persistence and remote control
// ============================================================================

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "smart_lock.db";

/// Default bind address for the remote control channel.
pub const DEFAULT_REMOTE_BIND_ADDR: &str = "0.0.0.0:3000";

/// Number of days aggregated by a `refresh` request.
pub const DEFAULT_REFRESH_DAYS: u32 = 7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_bracketed() {
        for marker in [MOTION_MARKER, AUDIO_MARKER] {
            assert_eq!(marker.first(), Some(&MARKER_OPEN));
            assert_eq!(marker.last(), Some(&MARKER_CLOSE));
            let inner = &marker[1..marker.len() - 1];
            assert!(!inner.contains(&MARKER_OPEN));
            assert!(!inner.contains(&MARKER_CLOSE));
        }
    }

    #[test]
    fn test_max_marker_length() {
        assert_eq!(MAX_MARKER_LENGTH, MOTION_MARKER.len());
        assert!(MAX_MARKER_LENGTH >= AUDIO_MARKER.len());
    }

    #[test]
    fn test_default_audio_budget() {
        let budget =
            DEFAULT_SAMPLE_RATE as usize * DEFAULT_AUDIO_DURATION_SECS as usize * BYTES_PER_SAMPLE;
        assert_eq!(budget, 160_000);
    }

    #[test]
    fn test_audio_commands_are_newline_terminated() {
        assert!(CMD_AUDIO_START.ends_with(b"\n"));
        assert!(CMD_AUDIO_STOP.ends_with(b"\n"));
    }
}
