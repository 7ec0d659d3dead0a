//! Mock serial link for testing and simulated runs.
//!
//! The reader half yields chunks injected through the handle; the writer half
//! records every command so tests can assert on what reached the lock.

use crate::{
    Result,
    error::HardwareError,
    traits::{CommandSink, SerialReader},
};
use smartlock_protocol::LockCommand;
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::Duration,
};

/// Default poll interval of the mock reader.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Constructor for a connected mock reader/writer pair.
///
/// # Examples
///
/// ```
/// use smartlock_hardware::mock::MockSerialLink;
/// use smartlock_hardware::traits::{CommandSink, SerialReader};
/// use smartlock_protocol::LockCommand;
///
/// let (mut reader, writer, handle) = MockSerialLink::new();
///
/// handle.inject(b"<SMART_LOCK_MOTION>");
/// let mut buf = [0u8; 64];
/// let n = reader.read_chunk(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"<SMART_LOCK_MOTION>");
///
/// writer.send(LockCommand::Unlock).unwrap();
/// assert_eq!(handle.written(), vec![LockCommand::Unlock]);
/// ```
pub struct MockSerialLink;

impl MockSerialLink {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MockSerialReader, MockSerialWriter, MockSerialHandle) {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        poll: Duration,
    ) -> (MockSerialReader, MockSerialWriter, MockSerialHandle) {
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let shared = Arc::new(WriterState::default());

        let reader = MockSerialReader {
            chunk_rx,
            pending: Vec::new(),
            poll,
            state: Arc::clone(&shared),
        };
        let writer = MockSerialWriter {
            state: Arc::clone(&shared),
        };
        let handle = MockSerialHandle {
            chunk_tx,
            state: shared,
        };
        (reader, writer, handle)
    }
}

#[derive(Debug, Default)]
struct WriterState {
    written: Mutex<Vec<LockCommand>>,
    fail_writes: AtomicBool,
    unplugged: AtomicBool,
}

/// Reader half of a mock serial link.
pub struct MockSerialReader {
    chunk_rx: mpsc::Receiver<Vec<u8>>,
    /// Remainder of a chunk larger than the caller's buffer.
    pending: Vec<u8>,
    poll: Duration,
    state: Arc<WriterState>,
}

impl SerialReader for MockSerialReader {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.state.unplugged.load(Ordering::SeqCst) {
            return Err(HardwareError::disconnected("mock serial link"));
        }
        if self.pending.is_empty() {
            match self.chunk_rx.recv_timeout(self.poll) {
                Ok(chunk) => self.pending = chunk,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(0),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(HardwareError::disconnected("mock serial link"));
                }
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn name(&self) -> &str {
        "mock serial link"
    }
}

/// Writer half of a mock serial link.
#[derive(Clone)]
pub struct MockSerialWriter {
    state: Arc<WriterState>,
}

impl CommandSink for MockSerialWriter {
    fn send(&self, command: LockCommand) -> Result<()> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(HardwareError::communication("mock write failure"));
        }
        self.state
            .written
            .lock()
            .map_err(|_| HardwareError::communication("mock writer poisoned"))?
            .push(command);
        Ok(())
    }
}

/// Handle for driving a mock serial link.
///
/// Dropping every handle disconnects the reader.
#[derive(Clone)]
pub struct MockSerialHandle {
    chunk_tx: mpsc::Sender<Vec<u8>>,
    state: Arc<WriterState>,
}

impl MockSerialHandle {
    /// Queue bytes for the reader. Returns `false` if the reader is gone.
    pub fn inject(&self, bytes: &[u8]) -> bool {
        self.chunk_tx.send(bytes.to_vec()).is_ok()
    }

    /// Commands written so far, in order.
    pub fn written(&self) -> Vec<LockCommand> {
        self.state
            .written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Number of times `command` was written.
    pub fn count(&self, command: LockCommand) -> usize {
        self.written().iter().filter(|c| **c == command).count()
    }

    /// Make every subsequent write fail with a communication error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate the cable being pulled: the reader reports a disconnect on
    /// its next read even while handles are alive. Writes keep working.
    pub fn unplug(&self) {
        self.state.unplugged.store(true, Ordering::SeqCst);
    }
}
