//! Mock camera for testing and simulated runs.
//!
//! Frames are pushed through a [`MockCameraHandle`]. The handle also exposes
//! what the camera was asked to do, so tests can check that every recording
//! was released.

use crate::{Result, error::HardwareError, traits::Camera, types::Frame};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, mpsc},
    time::Duration,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct CameraState {
    recordings: Vec<PathBuf>,
    stopped: usize,
    active: bool,
    fail_start: bool,
}

/// Mock camera.
///
/// `start_recording` creates an empty file at the requested path so later
/// pipeline stages have an artifact to work with.
///
/// # Examples
///
/// ```
/// use smartlock_hardware::mock::MockCamera;
/// use smartlock_hardware::traits::Camera;
/// use smartlock_hardware::Frame;
///
/// let (mut camera, handle) = MockCamera::new();
/// handle.push_frame(Frame::solid(4, 4, 10));
///
/// let frame = camera.next_frame().unwrap().unwrap();
/// assert_eq!(frame.width, 4);
/// ```
pub struct MockCamera {
    frame_rx: mpsc::Receiver<Frame>,
    state: Arc<Mutex<CameraState>>,
    poll: Duration,
}

impl MockCamera {
    pub fn new() -> (Self, MockCameraHandle) {
        let (frame_tx, frame_rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(CameraState::default()));
        let camera = Self {
            frame_rx,
            state: Arc::clone(&state),
            poll: DEFAULT_POLL_INTERVAL,
        };
        (camera, MockCameraHandle { frame_tx, state })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CameraState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| HardwareError::capture("mock camera state poisoned"))?;
        Ok(f(&mut state))
    }
}

impl Camera for MockCamera {
    fn start_recording(&mut self, path: &Path) -> Result<()> {
        let fail = self.with_state(|s| s.fail_start)?;
        if fail {
            return Err(HardwareError::capture("mock camera refused to start"));
        }
        std::fs::write(path, b"")?;
        self.with_state(|s| {
            s.recordings.push(path.to_path_buf());
            s.active = true;
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.frame_rx.recv_timeout(self.poll) {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // No handle left to feed frames; behave like an idle sensor.
                std::thread::sleep(self.poll);
                Ok(None)
            }
        }
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.with_state(|s| {
            if s.active {
                s.active = false;
                s.stopped += 1;
            }
        })
    }
}

/// Handle for driving a [`MockCamera`].
#[derive(Debug, Clone)]
pub struct MockCameraHandle {
    frame_tx: mpsc::Sender<Frame>,
    state: Arc<Mutex<CameraState>>,
}

impl MockCameraHandle {
    /// Queue a frame for the camera to deliver.
    pub fn push_frame(&self, frame: Frame) -> bool {
        self.frame_tx.send(frame).is_ok()
    }

    /// Paths of every recording started so far.
    pub fn recordings(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .map(|s| s.recordings.clone())
            .unwrap_or_default()
    }

    /// Number of recordings that were stopped.
    pub fn stopped(&self) -> usize {
        self.state.lock().map(|s| s.stopped).unwrap_or_default()
    }

    /// Whether a recording is currently running.
    pub fn is_recording(&self) -> bool {
        self.state.lock().map(|s| s.active).unwrap_or_default()
    }

    /// Make `start_recording` fail.
    pub fn set_fail_start(&self, fail: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.fail_start = fail;
        }
    }
}
