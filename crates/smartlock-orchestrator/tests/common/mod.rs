//! Shared harness for orchestrator scenario tests.
//!
//! Wires a full orchestrator over mock devices and an in-memory database,
//! with short recording windows so episodes finish in milliseconds.

#![allow(dead_code)]

use smartlock_core::{AccessMethod, AudioBudget, FaceEncoding};
use smartlock_hardware::mock::{
    MockCamera, MockCameraHandle, MockRecognizer, MockRecognizerHandle, MockSerialHandle,
    MockSerialLink,
};
use smartlock_orchestrator::{
    ArtifactMerger, Orchestrator, OrchestratorContext, OrchestratorHandle, PipelineSettings,
};
use smartlock_protocol::LockCommand;
use smartlock_storage::{
    AccessGrant, AccessLogEntry, DailyAccessCount, Database, EnrolledIdentity, EnrollmentRecord,
    Identity, PersistenceGateway, SqliteGateway, StorageError, StorageResult,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use tempfile::TempDir;

pub const MOTION: &[u8] = b"<SMART_LOCK_MOTION>";
pub const AUDIO: &[u8] = b"<SMART_LOCK_AUDIO>";

/// 8 Hz for 1 s: a 16-byte payload.
pub const BUDGET: AudioBudget = AudioBudget {
    sample_rate: 8,
    duration_secs: 1,
};

pub const VIDEO_WINDOW: Duration = Duration::from_millis(300);
pub const WAIT: Duration = Duration::from_secs(5);

/// Gateway wrapper that can fail access log writes on demand and records
/// how many unlock commands had been written when each log write began.
pub struct FlakyGateway {
    pub inner: SqliteGateway,
    serial: MockSerialHandle,
    fail_access_logs: AtomicBool,
    unlocks_at_log: Mutex<Vec<usize>>,
}

impl FlakyGateway {
    pub fn set_fail_access_logs(&self, fail: bool) {
        self.fail_access_logs.store(fail, Ordering::SeqCst);
    }

    pub fn unlocks_at_log(&self) -> Vec<usize> {
        self.unlocks_at_log.lock().unwrap().clone()
    }

    pub async fn logs(&self) -> Vec<AccessLogEntry> {
        self.inner.recent_access_logs(100).await.unwrap()
    }
}

impl PersistenceGateway for FlakyGateway {
    async fn find_identity_by_name(&self, name: &str) -> StorageResult<Option<Identity>> {
        self.inner.find_identity_by_name(name).await
    }

    async fn create_identity(&self, name: &str) -> StorageResult<i64> {
        self.inner.create_identity(name).await
    }

    async fn add_embedding(
        &self,
        identity_id: i64,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> StorageResult<i64> {
        self.inner.add_embedding(identity_id, encoding, source_path).await
    }

    async fn list_identities_with_embeddings(&self) -> StorageResult<Vec<EnrolledIdentity>> {
        self.inner.list_identities_with_embeddings().await
    }

    async fn append_access_log(
        &self,
        method: AccessMethod,
        identity_id: Option<i64>,
        artifact_path: Option<&str>,
    ) -> StorageResult<i64> {
        self.inner
            .append_access_log(method, identity_id, artifact_path)
            .await
    }

    async fn record_access(&self, grant: &AccessGrant) -> StorageResult<i64> {
        self.unlocks_at_log
            .lock()
            .unwrap()
            .push(self.serial.count(LockCommand::Unlock));
        if self.fail_access_logs.load(Ordering::SeqCst) {
            return Err(StorageError::Validation("injected write failure".into()));
        }
        self.inner.record_access(grant).await
    }

    async fn enroll_embedding(
        &self,
        name: &str,
        encoding: &FaceEncoding,
        source_path: &str,
    ) -> StorageResult<EnrollmentRecord> {
        self.inner.enroll_embedding(name, encoding, source_path).await
    }

    async fn daily_access_counts(&self, days: u32) -> StorageResult<Vec<DailyAccessCount>> {
        self.inner.daily_access_counts(days).await
    }
}

/// Merger that writes a placeholder output and records its inputs.
#[derive(Default)]
pub struct RecordingMerger {
    calls: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
}

impl RecordingMerger {
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ArtifactMerger for RecordingMerger {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> smartlock_orchestrator::Result<()> {
        assert!(video.exists(), "video intermediate missing");
        assert!(audio.exists(), "audio intermediate missing");
        std::fs::write(output, b"merged")?;
        self.calls
            .lock()
            .unwrap()
            .push((video.to_path_buf(), audio.to_path_buf(), output.to_path_buf()));
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub db: Database,
    pub gateway: Arc<FlakyGateway>,
    pub serial: MockSerialHandle,
    pub camera: MockCameraHandle,
    pub faces: MockRecognizerHandle,
    pub merger: Arc<RecordingMerger>,
    pub handle: OrchestratorHandle<FlakyGateway>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|settings| settings).await
    }

    pub async fn start_with(configure: impl FnOnce(PipelineSettings) -> PipelineSettings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().await.unwrap();

        let (reader, writer, serial) = MockSerialLink::new();
        let (camera, camera_handle) = MockCamera::new();
        let (recognizer, faces) = MockRecognizer::new();
        let merger = Arc::new(RecordingMerger::default());

        let gateway = Arc::new(FlakyGateway {
            inner: SqliteGateway::new(db.pool().clone()),
            serial: serial.clone(),
            fail_access_logs: AtomicBool::new(false),
            unlocks_at_log: Mutex::new(Vec::new()),
        });

        let settings = configure(
            PipelineSettings::default()
                .with_dirs(dir.path().join("captures"), dir.path().join("videos"))
                .with_video_duration(VIDEO_WINDOW)
                .with_audio_budget(BUDGET)
                .with_audio_timeout(None),
        );

        let ctx = OrchestratorContext::new(
            Arc::new(writer),
            Arc::new(recognizer),
            merger.clone(),
            Arc::clone(&gateway),
            settings,
        );
        let handle = Orchestrator::start(ctx, Box::new(reader), Box::new(camera))
            .await
            .unwrap();

        Self {
            dir,
            db,
            gateway,
            serial,
            camera: camera_handle,
            faces,
            merger,
            handle,
        }
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.dir.path().join("captures")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("videos")
    }

    /// Enroll `name` with the mock face for `seed`, shown on frames of `level`.
    pub async fn enroll(&self, name: &str, seed: u8, level: u8) -> EnrollmentRecord {
        let encoding = MockRecognizer::encoding_for(seed);
        let image = self.dir.path().join(format!("{name}.jpg"));
        self.faces.register_artifact(image.clone(), vec![encoding.clone()]);
        self.faces.show_face(level, encoding);
        self.handle
            .context()
            .enroller()
            .enroll(name, &image)
            .await
            .unwrap()
    }

    /// Inject a motion marker and wait until the recording is running.
    pub async fn start_episode(&self) -> String {
        let before = self.serial.count(LockCommand::AudioStart);
        assert!(self.serial.inject(MOTION));
        assert!(
            eventually(|| self.serial.count(LockCommand::AudioStart) == before + 1).await,
            "audio was not requested"
        );
        assert!(eventually(|| self.camera.is_recording()).await, "recording did not start");
        self.latest_token()
    }

    /// Capture token of the most recent recording.
    pub fn latest_token(&self) -> String {
        let path = self.camera.recordings().pop().unwrap();
        let name = path.file_stem().unwrap().to_string_lossy().into_owned();
        name.trim_start_matches("video_").to_string()
    }

    pub async fn wait_recording_stopped(&self, stops: usize) {
        assert!(
            eventually(|| self.camera.stopped() >= stops && !self.camera.is_recording()).await,
            "recording did not stop"
        );
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await.unwrap();
        assert!(!self.camera.is_recording(), "camera left recording");
        self.db.close().await;
    }
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn audio_payload() -> Vec<u8> {
    (0..BUDGET.byte_len()).map(|i| (i % 200) as u8).collect()
}
