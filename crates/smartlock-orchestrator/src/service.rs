//! The orchestrator's task set: serial reader, session loop and recognition.

use crate::{
    capture::CapturePipeline,
    context::OrchestratorContext,
    error::{OrchestratorError, Result},
    frame_slot::FrameSlot,
    recognition::{RecognitionWorker, TaggedFrame},
    remote::RemoteHandler,
};
use smartlock_hardware::{Camera, SerialReader};
use smartlock_protocol::{DecodedEvent, DecoderState, ProtocolDecoder};
use smartlock_storage::{PersistenceGateway, StorageResult};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinSet, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Bytes requested per serial read.
const SERIAL_READ_BUFFER: usize = 4096;

/// Serial chunks buffered between the reader thread and the session loop.
const CHUNK_CHANNEL_CAPACITY: usize = 256;

/// Pause after a transient serial read error.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Blocking serial read loop; runs until shutdown or disconnect.
///
/// Chunks are forwarded with `blocking_send`, so a slow session loop applies
/// backpressure instead of losing audio bytes.
fn read_serial(
    mut reader: Box<dyn SerialReader>,
    chunks: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) -> Result<()> {
    let device = reader.name().to_string();
    info!(device = %device, "Serial reader started");
    let mut buf = vec![0u8; SERIAL_READ_BUFFER];

    let result = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }
        match reader.read_chunk(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                trace!(bytes = n, "Serial chunk");
                if chunks.blocking_send(buf[..n].to_vec()).is_err() {
                    break Ok(());
                }
            }
            Err(e) if e.is_disconnect() => {
                error!(device = %device, error = %e, "Serial link lost");
                break Err(e.into());
            }
            Err(e) => {
                warn!(device = %device, error = %e, "Serial read failed");
                std::thread::sleep(READ_RETRY_DELAY);
            }
        }
    };

    drop(reader);
    info!(device = %device, "Serial port released");
    result
}

/// Owns the decoder and the capture pipeline; reacts to decoded events.
struct SessionLoop {
    decoder: ProtocolDecoder,
    capture: CapturePipeline,
    chunks: mpsc::Receiver<Vec<u8>>,
    frames: Arc<FrameSlot<TaggedFrame>>,
    audio_timeout: Option<Duration>,
    audio_deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl SessionLoop {
    async fn run(mut self) -> Result<()> {
        loop {
            let deadline = self.audio_deadline;
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                chunk = self.chunks.recv() => match chunk {
                    Some(chunk) => self.handle_chunk(&chunk).await,
                    None => {
                        error!("Serial link lost, motion handling offline until restart");
                        self.cancel.cancelled().await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_audio_timeout().await;
                }
            }
        }

        self.frames.close();
        self.capture.shutdown().await;
        debug!("Session loop stopped");
        Ok(())
    }

    async fn handle_chunk(&mut self, chunk: &[u8]) {
        self.decoder.feed(chunk);
        let events: Vec<DecodedEvent> = self.decoder.drain_events().collect();
        for event in events {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: DecodedEvent) {
        match event {
            DecodedEvent::Motion => {
                self.capture.on_motion().await;
            }
            DecodedEvent::AudioHeader => {
                debug!("Audio stream started");
                self.audio_deadline = self.audio_timeout.map(|t| Instant::now() + t);
            }
            DecodedEvent::AudioComplete(pcm) => {
                self.audio_deadline = None;
                self.capture.on_audio_complete(&pcm).await;
            }
            DecodedEvent::Unknown(_) => {}
        }
    }

    async fn on_audio_timeout(&mut self) {
        self.audio_deadline = None;
        if self.decoder.state() != DecoderState::AwaitingAudio {
            return;
        }
        if let Some((received, target)) = self.decoder.audio_progress() {
            warn!(received, target, "Audio stream stalled");
        }
        self.decoder.reset();
        self.capture.abort_episode().await;
    }
}

/// Re-read enrolled faces every `period` until shutdown.
///
/// Enrollments made by another process against the same database become
/// visible within one period. A failed reload keeps the previous set.
async fn reload_known_faces<G: PersistenceGateway + 'static>(
    ctx: OrchestratorContext<G>,
    period: Duration,
) -> Result<()> {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; startup already loaded the set.
    ticks.tick().await;

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = ticks.tick() => {
                if let Err(e) = ctx.reload_known_faces().await {
                    warn!(error = %e, "Known face reload failed, keeping previous set");
                }
            }
        }
    }
    debug!("Known face reloader stopped");
    Ok(())
}

/// Task termination classification for shutdown handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Success,
    Error,
    Cancelled,
    Panic,
}

fn classify_task_result(
    result: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> TaskTermination {
    match result {
        Ok(Ok(())) => TaskTermination::Success,
        Ok(Err(e)) => {
            warn!(error = %e, "Task ended with error");
            TaskTermination::Error
        }
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(e) => {
            error!(error = %e, "Task panicked");
            TaskTermination::Panic
        }
    }
}

/// Entry point for starting the orchestrator.
pub struct Orchestrator;

impl Orchestrator {
    /// Spawn the serial reader, session loop and recognition worker.
    ///
    /// Creates the artifact directories and loads the known-face set first.
    /// A failed load is logged and the orchestrator starts with an empty set.
    pub async fn start<G: PersistenceGateway + 'static>(
        ctx: OrchestratorContext<G>,
        reader: Box<dyn SerialReader>,
        camera: Box<dyn Camera>,
    ) -> Result<OrchestratorHandle<G>> {
        tokio::fs::create_dir_all(&ctx.settings.capture_dir).await?;
        tokio::fs::create_dir_all(&ctx.settings.output_dir).await?;

        if let Err(e) = ctx.reload_known_faces().await {
            warn!(error = %e, "Failed to load known faces, starting empty");
        }

        let frames = Arc::new(FrameSlot::new());
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        let cancel = ctx.cancel.clone();
        tasks.spawn_blocking(move || read_serial(reader, chunk_tx, cancel));

        let worker = RecognitionWorker::new(
            Arc::clone(&frames),
            Arc::clone(&ctx.known_faces),
            Arc::clone(&ctx.recognizer),
            ctx.arbiter(),
            ctx.settings.output_dir.clone(),
            ctx.settings.downsample_factor,
            ctx.cancel.clone(),
        );
        tasks.spawn(worker.run());

        let capture = CapturePipeline::new(
            camera,
            Arc::clone(&ctx.sink),
            Arc::clone(&ctx.merger),
            Arc::clone(&frames),
            ctx.settings.clone(),
            ctx.cancel.clone(),
        );
        let session = SessionLoop {
            decoder: ProtocolDecoder::new(ctx.settings.audio_budget),
            capture,
            chunks: chunk_rx,
            frames,
            audio_timeout: ctx.settings.audio_timeout,
            audio_deadline: None,
            cancel: ctx.cancel.clone(),
        };
        tasks.spawn(session.run());

        if let Some(period) = ctx.settings.known_faces_reload.filter(|p| !p.is_zero()) {
            tasks.spawn(reload_known_faces(ctx.clone(), period));
        }

        info!(
            audio_bytes = ctx.settings.audio_budget.byte_len(),
            known_faces = ctx.known_faces.snapshot().len(),
            "Orchestrator started"
        );
        Ok(OrchestratorHandle { ctx, tasks })
    }
}

/// Handle to a running orchestrator.
pub struct OrchestratorHandle<G> {
    ctx: OrchestratorContext<G>,
    tasks: JoinSet<Result<()>>,
}

impl<G: PersistenceGateway + 'static> OrchestratorHandle<G> {
    pub fn context(&self) -> &OrchestratorContext<G> {
        &self.ctx
    }

    pub fn remote_handler(&self) -> RemoteHandler<G> {
        self.ctx.remote_handler()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    /// Reload enrolled faces now, e.g. after an out-of-process enrollment.
    pub async fn reload_known_faces(&self) -> StorageResult<usize> {
        self.ctx.reload_known_faces().await
    }

    /// Cancel every task and wait for them to finish.
    ///
    /// Task errors are logged and counted but do not fail shutdown. Returns
    /// an error only if a task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        self.ctx.cancel.cancel();

        let mut error_count = 0;
        let mut panic_count = 0;
        while let Some(result) = self.tasks.join_next().await {
            match classify_task_result(result) {
                TaskTermination::Success | TaskTermination::Cancelled => {}
                TaskTermination::Error => error_count += 1,
                TaskTermination::Panic => panic_count += 1,
            }
        }

        info!(errors = error_count, panics = panic_count, "Orchestrator stopped");
        if panic_count > 0 {
            return Err(OrchestratorError::task_failed(format!(
                "{panic_count} task(s) panicked"
            )));
        }
        Ok(())
    }
}
