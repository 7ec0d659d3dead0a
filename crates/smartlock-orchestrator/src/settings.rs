use smartlock_core::{AudioBudget, EdgeConfig, constants};
use std::{path::PathBuf, time::Duration};

/// Runtime settings for the capture and recognition pipeline.
///
/// Derived from [`EdgeConfig`] at startup. Durations are kept as
/// [`Duration`] so tests can run episodes in milliseconds.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory for per-episode intermediates.
    pub capture_dir: PathBuf,

    /// Directory for merged recordings.
    pub output_dir: PathBuf,

    /// Recording window started on motion.
    pub video_duration: Duration,

    /// Audio watchdog. `None` waits forever.
    pub audio_timeout: Option<Duration>,

    pub audio_budget: AudioBudget,

    pub normalization_divisor: f64,

    pub downsample_factor: u32,

    /// Days aggregated by a refresh request.
    pub refresh_days: u32,

    /// Periodic known-face reload. `None` reloads only on demand.
    pub known_faces_reload: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capture_dir: PathBuf::from(constants::DEFAULT_CAPTURE_DIR),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            video_duration: Duration::from_secs(constants::DEFAULT_VIDEO_DURATION_SECS),
            audio_timeout: Some(Duration::from_secs(constants::DEFAULT_AUDIO_TIMEOUT_SECS)),
            audio_budget: AudioBudget::default(),
            normalization_divisor: constants::DEFAULT_NORMALIZATION_DIVISOR,
            downsample_factor: constants::DEFAULT_DOWNSAMPLE_FACTOR,
            refresh_days: constants::DEFAULT_REFRESH_DAYS,
            known_faces_reload: Some(Duration::from_secs(
                constants::DEFAULT_KNOWN_FACES_RELOAD_SECS,
            )),
        }
    }
}

impl From<&EdgeConfig> for PipelineSettings {
    fn from(config: &EdgeConfig) -> Self {
        Self {
            capture_dir: config.capture.directory.clone(),
            output_dir: config.capture.output_directory.clone(),
            video_duration: config.capture.video_duration(),
            audio_timeout: config.capture.audio_timeout(),
            audio_budget: config.audio.budget(),
            normalization_divisor: config.audio.normalization_divisor,
            downsample_factor: config.recognition.downsample_factor,
            refresh_days: constants::DEFAULT_REFRESH_DAYS,
            known_faces_reload: config.recognition.reload_interval(),
        }
    }
}

impl PipelineSettings {
    pub fn with_dirs(mut self, capture_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = capture_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_video_duration(mut self, duration: Duration) -> Self {
        self.video_duration = duration;
        self
    }

    pub fn with_audio_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.audio_timeout = timeout;
        self
    }

    pub fn with_audio_budget(mut self, budget: AudioBudget) -> Self {
        self.audio_budget = budget;
        self
    }

    pub fn with_downsample_factor(mut self, factor: u32) -> Self {
        self.downsample_factor = factor;
        self
    }

    pub fn with_known_faces_reload(mut self, interval: Option<Duration>) -> Self {
        self.known_faces_reload = interval;
        self
    }
}
