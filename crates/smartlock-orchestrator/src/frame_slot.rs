//! Single-slot frame hand-off between recording and recognition.
//!
//! The producer never blocks: a new frame replaces whatever is waiting.
//! Recognition always sees the freshest frame and stale frames are dropped.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use tokio::sync::Notify;

/// Capacity-1, drop-oldest queue with a single consumer.
#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Offer a value, replacing any value not yet taken.
    ///
    /// Returns `false` once the slot is closed.
    pub fn push(&self, value: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        if slot.replace(value).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        drop(slot);
        self.notify.notify_one();
        true
    }

    /// Take the waiting value without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Wait for the next value. Returns `None` once the slot is closed.
    pub async fn take(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(value) = self.try_take() {
                return Some(value);
            }
            notified.await;
        }
    }

    /// Close the slot and drop any waiting value. Wakes the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        drop(self.try_take());
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Values overwritten before the consumer took them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
