//! Capture pipeline: motion-triggered recordings and audio artifacts.
//!
//! A motion event starts an episode: the microcontroller is asked to stream
//! audio and the camera records for the configured window on the blocking
//! pool, feeding live frames to the recognition slot. When the audio payload
//! completes, the WAV is written, the episode's recording is awaited and the
//! two are merged into one file.

use crate::{
    arbiter::send_command,
    episode::Episode,
    error::Result,
    frame_slot::FrameSlot,
    merge::ArtifactMerger,
    recognition::TaggedFrame,
    settings::PipelineSettings,
};
use smartlock_core::CaptureToken;
use smartlock_hardware::{Camera, CommandSink, HardwareError};
use smartlock_protocol::{LockCommand, encode_wav_f32, normalize_samples};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The camera while no recording holds it.
type ParkedCamera = Arc<Mutex<Option<Box<dyn Camera>>>>;

/// Returns the camera to its parking spot on every exit path of a recording.
struct RecordingGuard {
    camera: Option<Box<dyn Camera>>,
    park: ParkedCamera,
}

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        let Some(mut camera) = self.camera.take() else {
            return;
        };
        if let Err(e) = camera.stop_recording() {
            warn!(error = %e, "Failed to stop recording");
        }
        match self.park.lock() {
            Ok(mut park) => *park = Some(camera),
            Err(_) => error!("Camera park poisoned, camera released"),
        }
    }
}

/// Record `path` for `duration`, pushing frames while the episode wants them.
fn record(
    mut guard: RecordingGuard,
    path: PathBuf,
    duration: Duration,
    episode: Arc<Episode>,
    frames: Arc<FrameSlot<TaggedFrame>>,
    cancel: CancellationToken,
) -> Result<PathBuf> {
    let camera = guard
        .camera
        .as_mut()
        .ok_or_else(|| HardwareError::capture("camera not available"))?;

    camera.start_recording(&path)?;
    info!(token = %episode.token(), path = %path.display(), "Recording started");

    let deadline = Instant::now() + duration;
    let mut captured = 0u64;
    while Instant::now() < deadline && !cancel.is_cancelled() {
        let Some(frame) = camera.next_frame()? else {
            continue;
        };
        captured += 1;
        if episode.wants_frames() {
            frames.push(TaggedFrame {
                episode: Arc::clone(&episode),
                frame,
            });
        }
    }

    drop(guard);
    info!(token = %episode.token(), frames = captured, "Recording finished");
    Ok(path)
}

/// Episode whose audio has not arrived yet.
struct PendingEpisode {
    episode: Arc<Episode>,
    video: JoinHandle<Result<PathBuf>>,
}

pub struct CapturePipeline {
    sink: Arc<dyn CommandSink>,
    merger: Arc<dyn ArtifactMerger>,
    camera: ParkedCamera,
    frames: Arc<FrameSlot<TaggedFrame>>,
    settings: PipelineSettings,
    cancel: CancellationToken,
    pending: Option<PendingEpisode>,
    finalizers: JoinSet<()>,
}

impl CapturePipeline {
    pub fn new(
        camera: Box<dyn Camera>,
        sink: Arc<dyn CommandSink>,
        merger: Arc<dyn ArtifactMerger>,
        frames: Arc<FrameSlot<TaggedFrame>>,
        settings: PipelineSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sink,
            merger,
            camera: Arc::new(Mutex::new(Some(camera))),
            frames,
            settings,
            cancel,
            pending: None,
            finalizers: JoinSet::new(),
        }
    }

    /// Start an episode. Returns `None` while a recording is still running.
    pub async fn on_motion(&mut self) -> Option<Arc<Episode>> {
        self.reap_finalizers();

        let camera = match self.camera.lock() {
            Ok(mut park) => park.take(),
            Err(_) => {
                error!("Camera park poisoned");
                None
            }
        };
        let Some(camera) = camera else {
            debug!("Motion during active recording ignored");
            return None;
        };

        let token = CaptureToken::now();
        info!(token = %token, "Motion detected");

        if let Err(e) = send_command(&self.sink, LockCommand::AudioStart).await {
            warn!(token = %token, error = %e, "Failed to request audio");
        }

        let episode = Arc::new(Episode::new(token.clone()));
        let guard = RecordingGuard {
            camera: Some(camera),
            park: Arc::clone(&self.camera),
        };
        let path = self.settings.capture_dir.join(token.video_file_name());
        let recording_path = path.clone();
        let duration = self.settings.video_duration;
        let frames = Arc::clone(&self.frames);
        let cancel = self.cancel.clone();
        let recording_episode = Arc::clone(&episode);

        let video = tokio::task::spawn_blocking(move || {
            let result = record(guard, path, duration, recording_episode, frames, cancel);
            if let Err(e) = &result {
                warn!(error = %e, "Recording failed");
            }
            result
        });

        if let Some(previous) = self.pending.replace(PendingEpisode {
            episode: Arc::clone(&episode),
            video,
        }) {
            warn!(token = %previous.episode.token(), "Previous episode ended without audio");
            self.finalizers
                .spawn(discard_video(previous, Some(recording_path)));
        }
        Some(episode)
    }

    /// Finish the current episode with its audio payload.
    pub async fn on_audio_complete(&mut self, pcm: &[u8]) {
        if let Err(e) = send_command(&self.sink, LockCommand::AudioStop).await {
            warn!(error = %e, "Failed to stop audio stream");
        }

        let pending = self.pending.take();
        let token = match &pending {
            Some(p) => p.episode.token().clone(),
            None => {
                let token = CaptureToken::now();
                warn!(token = %token, "Audio received without a motion episode");
                token
            }
        };
        info!(token = %token, bytes = pcm.len(), "Audio received");

        let samples = normalize_samples(pcm, self.settings.normalization_divisor);
        let wav = encode_wav_f32(&samples, self.settings.audio_budget.sample_rate);
        let audio_path = self.settings.capture_dir.join(token.audio_file_name());
        let output = self.settings.output_dir.join(token.merged_file_name());
        let merger = Arc::clone(&self.merger);
        let video = pending.map(|p| p.video);

        self.finalizers.spawn(async move {
            if let Err(e) = tokio::fs::write(&audio_path, &wav).await {
                warn!(token = %token, error = %e, "Failed to write audio");
                return;
            }
            debug!(token = %token, path = %audio_path.display(), "Audio saved");

            let Some(video) = video else {
                return;
            };
            let video_path = match video.await {
                Ok(Ok(path)) => path,
                Ok(Err(_)) => {
                    warn!(token = %token, "No video for episode, audio kept");
                    return;
                }
                Err(e) => {
                    error!(token = %token, error = %e, "Recording task failed");
                    return;
                }
            };

            merge_episode(merger, &token, video_path, audio_path, output).await;
        });
    }

    /// Drop the current episode after an audio timeout.
    pub async fn abort_episode(&mut self) {
        if let Err(e) = send_command(&self.sink, LockCommand::AudioStop).await {
            warn!(error = %e, "Failed to stop audio stream");
        }
        match self.pending.take() {
            Some(pending) => {
                warn!(token = %pending.episode.token(), "Audio timed out, episode aborted");
                self.finalizers.spawn(discard_video(pending, None));
            }
            None => warn!("Audio timed out"),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.camera.lock().map(|park| park.is_none()).unwrap_or(false)
    }

    /// Wait for the running recording and every pending merge.
    ///
    /// Recordings observe the cancellation token, so this returns within one
    /// camera poll interval plus the time any merge in flight needs.
    pub async fn shutdown(mut self) {
        if let Some(pending) = self.pending.take()
            && let Err(e) = pending.video.await
        {
            error!(error = %e, "Recording task failed during shutdown");
        }
        while let Some(result) = self.finalizers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Capture finalizer failed");
            }
        }
        debug!("Capture pipeline stopped");
    }

    fn reap_finalizers(&mut self) {
        while let Some(result) = self.finalizers.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Capture finalizer failed");
            }
        }
    }
}

async fn merge_episode(
    merger: Arc<dyn ArtifactMerger>,
    token: &CaptureToken,
    video: PathBuf,
    audio: PathBuf,
    output: PathBuf,
) {
    let merged = {
        let (video, audio, output) = (video.clone(), audio.clone(), output.clone());
        tokio::task::spawn_blocking(move || merger.merge(&video, &audio, &output)).await
    };

    match merged {
        Ok(Ok(())) => {
            remove_intermediate(&video).await;
            remove_intermediate(&audio).await;
            info!(token = %token, path = %output.display(), "Recording saved");
        }
        Ok(Err(e)) => warn!(token = %token, error = %e, "Merge failed, intermediates kept"),
        Err(e) => error!(token = %token, error = %e, "Merge task failed"),
    }
}

/// Wait for an abandoned episode's recording and delete its video.
///
/// `in_use` is skipped: two episodes in the same second share a token, so
/// the replacement may be recording to the same file.
async fn discard_video(episode: PendingEpisode, in_use: Option<PathBuf>) {
    let token = episode.episode.token().clone();
    match episode.video.await {
        Ok(Ok(path)) if in_use.as_deref() == Some(path.as_path()) => {
            debug!(token = %token, "Abandoned video reused by the next episode");
        }
        Ok(Ok(path)) => {
            remove_intermediate(&path).await;
            warn!(token = %token, path = %path.display(), "Video without audio discarded");
        }
        Ok(Err(_)) => {}
        Err(e) => error!(token = %token, error = %e, "Recording task failed"),
    }
}

async fn remove_intermediate(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove intermediate");
    }
}
