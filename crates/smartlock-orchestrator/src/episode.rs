use smartlock_core::CaptureToken;
use std::sync::atomic::{AtomicBool, Ordering};

/// One motion-triggered recognition episode.
///
/// Frames captured during the episode carry an `Arc<Episode>`. The
/// authorization latch guarantees at most one face unlock per episode no
/// matter how many frames match.
#[derive(Debug)]
pub struct Episode {
    token: CaptureToken,
    authorized: AtomicBool,
    undetectable: AtomicBool,
}

impl Episode {
    pub fn new(token: CaptureToken) -> Self {
        Self {
            token,
            authorized: AtomicBool::new(false),
            undetectable: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> &CaptureToken {
        &self.token
    }

    /// Set the latch. Returns `true` for exactly one caller.
    pub fn try_authorize(&self) -> bool {
        self.authorized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    /// Mark the episode as having nobody to recognize.
    pub fn mark_undetectable(&self) {
        self.undetectable.store(true, Ordering::Release);
    }

    pub fn is_undetectable(&self) -> bool {
        self.undetectable.load(Ordering::Acquire)
    }

    /// Whether frames from this episode still need recognition.
    pub fn wants_frames(&self) -> bool {
        !self.is_authorized() && !self.is_undetectable()
    }
}
