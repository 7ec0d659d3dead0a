//! Audio/video merge step at the end of a capture episode.

use crate::error::{OrchestratorError, Result};
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::debug;

/// Combines an episode's video and audio into one recording.
///
/// Blocking; the capture pipeline calls it from the blocking pool.
pub trait ArtifactMerger: Send + Sync {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// Merger backed by the external `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegMerger {
    binary: PathBuf,
}

impl FfmpegMerger {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for copying the video stream and encoding audio as AAC,
    /// cut to the shorter of the two inputs.
    pub fn args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            video.display().to_string(),
            "-i".into(),
            audio.display().to_string(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
            output.display().to_string(),
        ]
    }
}

impl Default for FfmpegMerger {
    fn default() -> Self {
        Self::new(smartlock_core::constants::DEFAULT_FFMPEG_BINARY)
    }
}

impl ArtifactMerger for FfmpegMerger {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        debug!(binary = %self.binary.display(), output = %output.display(), "Running merge");
        let result = Command::new(&self.binary)
            .args(Self::args(video, audio, output))
            .output()
            .map_err(|e| {
                OrchestratorError::merge_failed(format!(
                    "failed to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = stderr.lines().last().unwrap_or_default();
            return Err(OrchestratorError::merge_failed(format!(
                "{} exited with {}: {tail}",
                self.binary.display(),
                result.status
            )));
        }
        Ok(())
    }
}
