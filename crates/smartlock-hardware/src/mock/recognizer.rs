//! Mock face recognizer for testing and simulated runs.
//!
//! Faces are keyed by the grey level of a frame's first pixel: a test
//! registers "level 40 shows alice" and pushes `Frame::solid(.., 40)`.
//! Downsampling keeps solid frames solid, so the key survives the
//! recognition worker's preprocessing.

use crate::{
    Result,
    error::HardwareError,
    traits::FaceRecognizer,
    types::{FaceComparison, FaceLocation, Frame},
};
use smartlock_core::{
    FaceEncoding,
    constants::{DEFAULT_MATCH_TOLERANCE, EMBEDDING_DIMENSIONS},
};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Default)]
struct RecognizerState {
    faces_by_level: HashMap<u8, Vec<FaceEncoding>>,
    artifacts: HashMap<PathBuf, Vec<FaceEncoding>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<RecognizerState>,
    locate_calls: AtomicUsize,
    unavailable: AtomicBool,
    /// Simulated inference time per `locate_faces` call.
    locate_delay_ms: AtomicU64,
}

/// Mock recognizer using Euclidean distance with a fixed tolerance.
///
/// # Examples
///
/// ```
/// use smartlock_hardware::{Frame, mock::MockRecognizer, traits::FaceRecognizer};
///
/// let (recognizer, handle) = MockRecognizer::new();
/// let alice = MockRecognizer::encoding_for(1);
/// handle.show_face(40, alice.clone());
///
/// let frame = Frame::solid(8, 8, 40);
/// let locations = recognizer.locate_faces(&frame).unwrap();
/// let encodings = recognizer.encode_faces(&frame, &locations).unwrap();
/// assert!(recognizer.compare(&alice, &encodings[0]).is_match);
/// ```
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    shared: Arc<Shared>,
    tolerance: f64,
    derive_unregistered: bool,
}

impl MockRecognizer {
    pub fn new() -> (Self, MockRecognizerHandle) {
        let shared = Arc::new(Shared::default());
        let recognizer = Self {
            shared: Arc::clone(&shared),
            tolerance: DEFAULT_MATCH_TOLERANCE,
            derive_unregistered: false,
        };
        (recognizer, MockRecognizerHandle { shared })
    }

    /// Recognizer for the daemon's simulated backend.
    ///
    /// Unregistered enrollment images get an encoding derived from their
    /// bytes, so `enroll` works without a model. Empty files contain no face.
    pub fn simulated() -> (Self, MockRecognizerHandle) {
        let (mut recognizer, handle) = Self::new();
        recognizer.derive_unregistered = true;
        (recognizer, handle)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Deterministic encoding for a test identity.
    ///
    /// Encodings for different seeds below 128 are at least `1.0` apart,
    /// well past the default match tolerance.
    pub fn encoding_for(seed: u8) -> FaceEncoding {
        let mut values = [0.0; EMBEDDING_DIMENSIONS];
        values[seed as usize % EMBEDDING_DIMENSIONS] = 1.0;
        values[(seed as usize + 1) % EMBEDDING_DIMENSIONS] = f64::from(seed) / 255.0;
        FaceEncoding::from(values)
    }

    fn derive_encoding(bytes: &[u8]) -> Option<FaceEncoding> {
        if bytes.is_empty() {
            return None;
        }
        let mut values = [0.0; EMBEDDING_DIMENSIONS];
        for (i, value) in values.iter_mut().enumerate() {
            *value = f64::from(bytes[i % bytes.len()]) / 255.0;
        }
        Some(FaceEncoding::from(values))
    }

    fn check_available(&self) -> Result<()> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(HardwareError::recognition_unavailable("mock recognizer disabled"));
        }
        Ok(())
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, RecognizerState>> {
        self.shared
            .state
            .lock()
            .map_err(|_| HardwareError::recognition_unavailable("mock recognizer poisoned"))
    }
}

impl FaceRecognizer for MockRecognizer {
    fn locate_faces(&self, frame: &Frame) -> Result<Vec<FaceLocation>> {
        self.check_available()?;
        self.shared.locate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.shared.locate_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let Some(&level) = frame.data.first() else {
            return Ok(Vec::new());
        };
        let count = self
            .state()?
            .faces_by_level
            .get(&level)
            .map_or(0, Vec::len);
        Ok(vec![FaceLocation::full_frame(frame); count])
    }

    fn encode_faces(&self, frame: &Frame, locations: &[FaceLocation]) -> Result<Vec<FaceEncoding>> {
        self.check_available()?;
        let Some(&level) = frame.data.first() else {
            return Ok(Vec::new());
        };
        let faces = self
            .state()?
            .faces_by_level
            .get(&level)
            .cloned()
            .unwrap_or_default();
        Ok(faces.into_iter().take(locations.len()).collect())
    }

    fn compare(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> FaceComparison {
        let distance = known.euclidean_distance(candidate);
        FaceComparison {
            distance,
            is_match: distance <= self.tolerance,
        }
    }

    fn encode_artifact(&self, path: &Path) -> Result<Vec<FaceEncoding>> {
        self.check_available()?;
        if let Some(encodings) = self.state()?.artifacts.get(path) {
            return Ok(encodings.clone());
        }
        if self.derive_unregistered {
            let bytes = std::fs::read(path)?;
            return Ok(Self::derive_encoding(&bytes).into_iter().collect());
        }
        Err(HardwareError::invalid_data(format!(
            "no enrollment image registered for {}",
            path.display()
        )))
    }
}

/// Handle for scripting a [`MockRecognizer`].
#[derive(Debug, Clone)]
pub struct MockRecognizerHandle {
    shared: Arc<Shared>,
}

impl MockRecognizerHandle {
    /// Frames whose first pixel has `level` contain a face with `encoding`.
    pub fn show_face(&self, level: u8, encoding: FaceEncoding) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.faces_by_level.entry(level).or_default().push(encoding);
        }
    }

    /// Make every face search block for `delay`, like a slow model would.
    pub fn set_locate_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.shared.locate_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Register the faces found in an enrollment image.
    pub fn register_artifact(&self, path: impl Into<PathBuf>, encodings: Vec<FaceEncoding>) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.artifacts.insert(path.into(), encodings);
        }
    }

    /// Number of `locate_faces` calls so far.
    pub fn locate_calls(&self) -> usize {
        self.shared.locate_calls.load(Ordering::SeqCst)
    }

    /// Make every recognition call fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }
}
