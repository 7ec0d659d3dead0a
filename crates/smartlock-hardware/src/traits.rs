//! Hardware seam definitions.
//!
//! These traits separate the orchestrator from the devices it drives: the
//! serial link to the lock microcontroller, the camera, and the face
//! recognition capability. Mock implementations live in [`crate::mock`].
//!
//! All methods are synchronous and may block. Callers run them on a
//! dedicated thread or on `tokio::task::spawn_blocking`, never directly on an
//! async worker. Every trait is object safe so the daemon can pick
//! implementations at runtime behind `Box<dyn ..>` / `Arc<dyn ..>`.

use crate::{
    error::Result,
    types::{FaceComparison, FaceLocation, Frame},
};
use smartlock_core::FaceEncoding;
use smartlock_protocol::LockCommand;
use std::path::Path;

/// Inbound half of the serial link.
pub trait SerialReader: Send {
    /// Read whatever bytes are available into `buf`.
    ///
    /// Blocks for at most the link's read timeout. Returns `Ok(0)` when the
    /// timeout elapsed without data, so the caller can check for shutdown.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Device identifier used in logs.
    fn name(&self) -> &str;
}

/// Outbound half of the serial link.
///
/// Shared between the orchestrator loop, the recognition path and the
/// remote handler, so implementations serialize writes internally.
pub trait CommandSink: Send + Sync {
    /// Write one command to the microcontroller.
    fn send(&self, command: LockCommand) -> Result<()>;
}

/// Video source for motion-triggered recordings.
pub trait Camera: Send {
    /// Begin recording video to `path`.
    fn start_recording(&mut self, path: &Path) -> Result<()>;

    /// Next live frame, or `Ok(None)` if none arrived within the
    /// camera's poll interval.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Finish the recording and release the device.
    ///
    /// Must be safe to call when no recording is active.
    fn stop_recording(&mut self) -> Result<()>;
}

/// Face detection, encoding and matching.
///
/// The embedding model itself is an external collaborator; this trait is
/// the boundary the orchestrator depends on.
pub trait FaceRecognizer: Send + Sync {
    /// Locate faces in a (typically downsampled) frame.
    fn locate_faces(&self, frame: &Frame) -> Result<Vec<FaceLocation>>;

    /// Encode the faces at `locations`, one encoding per location.
    fn encode_faces(&self, frame: &Frame, locations: &[FaceLocation]) -> Result<Vec<FaceEncoding>>;

    /// Compare a known encoding with a candidate.
    fn compare(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> FaceComparison;

    /// Encode every face found in an enrollment image.
    fn encode_artifact(&self, path: &Path) -> Result<Vec<FaceEncoding>>;
}
