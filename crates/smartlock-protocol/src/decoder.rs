//! Stateful decoder for the lock microcontroller's serial stream.
//!
//! The serial link carries two kinds of traffic with no length prefix and no
//! checksum: short bracketed markers, and a raw PCM audio block that follows
//! the audio marker. The decoder keeps one growable buffer across chunks and
//! a two-state machine to tell them apart.
//!
//! ```text
//! <SMART_LOCK_MOTION>                       -> Motion
//! <SMART_LOCK_AUDIO><budget bytes of PCM>   -> AudioHeader, AudioComplete(pcm)
//! <ANYTHING_ELSE>                           -> Unknown(token)
//! ```
//!
//! # Usage
//!
//! ```
//! use smartlock_core::AudioBudget;
//! use smartlock_protocol::{DecodedEvent, ProtocolDecoder};
//!
//! let mut decoder = ProtocolDecoder::new(AudioBudget::new(2, 1));
//!
//! decoder.feed(b"<SMART_LOCK_MO");
//! assert!(decoder.next_event().is_none());
//!
//! decoder.feed(b"TION><SMART_LOCK_AUDIO>\x01\x02\x03\x04");
//! let events: Vec<_> = decoder.drain_events().collect();
//! assert_eq!(events.len(), 3);
//! assert_eq!(events[0], DecodedEvent::Motion);
//! assert_eq!(events[1], DecodedEvent::AudioHeader);
//! ```

use bytes::{Buf, Bytes, BytesMut};
use smartlock_core::{
    AudioBudget,
    constants::{AUDIO_MARKER, MARKER_CLOSE, MARKER_OPEN, MAX_MARKER_LENGTH, MOTION_MARKER},
};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Initial capacity of the marker scan buffer.
const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Progress is traced every time this many audio bytes have been appended.
const PROGRESS_TRACE_STEP: usize = 16 * 1024;

/// Decoder state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Scanning for bracketed markers.
    Idle,

    /// Accumulating raw audio payload until the sample budget is reached.
    ///
    /// Every byte in this state is payload, including bytes that look like
    /// `<` or `>`.
    AwaitingAudio,
}

/// Events produced by [`ProtocolDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// The PIR sensor fired.
    Motion,
    /// The audio marker was seen; payload bytes follow.
    AudioHeader,
    /// The full audio budget was received (exactly `byte_len` bytes).
    AudioComplete(Bytes),
    /// A well-formed `<...>` token that is not a known marker.
    Unknown(Bytes),
}

/// Stateful decoder for the serial stream.
///
/// # State Machine
///
/// ```text
/// ┌──────┐  <SMART_LOCK_AUDIO>   ┌───────────────┐
/// │ Idle │──────────────────────>│ AwaitingAudio │
/// └──────┘                       └───────────────┘
///    ^  │ <SMART_LOCK_MOTION>            │
///    │  │ (emit Motion, stay)            │ budget reached
///    │  └─────┘                          │ (emit AudioComplete,
///    │                                   │  drop the excess)
///    └───────────────────────────────────┘
/// ```
///
/// [`reset`](ProtocolDecoder::reset) returns to `Idle` from either state and
/// drops any partial audio.
#[derive(Debug)]
pub struct ProtocolDecoder {
    buffer: BytesMut,
    state: DecoderState,
    audio: BytesMut,
    target: usize,
    last_progress: usize,
    events: VecDeque<DecodedEvent>,
}

impl ProtocolDecoder {
    /// Create a decoder for the given audio budget.
    pub fn new(budget: AudioBudget) -> Self {
        let target = budget.byte_len();
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: DecoderState::Idle,
            audio: BytesMut::with_capacity(target),
            target,
            last_progress: 0,
            events: VecDeque::new(),
        }
    }

    /// Append a chunk read from the serial link and decode as far as possible.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        loop {
            let progressed = match self.state {
                DecoderState::Idle => self.scan_for_marker(),
                DecoderState::AwaitingAudio => self.fill_audio(),
            };
            if !progressed {
                break;
            }
        }
    }

    /// Pop the oldest decoded event.
    pub fn next_event(&mut self) -> Option<DecodedEvent> {
        self.events.pop_front()
    }

    /// Iterator over every event decoded so far.
    pub fn drain_events(&mut self) -> DrainEvents<'_> {
        DrainEvents { decoder: self }
    }

    pub fn events_available(&self) -> usize {
        self.events.len()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// `(received, target)` audio byte counts while awaiting audio.
    pub fn audio_progress(&self) -> Option<(usize, usize)> {
        match self.state {
            DecoderState::AwaitingAudio => Some((self.audio.len(), self.target)),
            DecoderState::Idle => None,
        }
    }

    /// Bytes held back while waiting for a marker to complete.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Abort the current episode and return to `Idle`.
    ///
    /// Partial audio and pending marker bytes are dropped. Events that were
    /// already decoded stay queued.
    pub fn reset(&mut self) {
        if self.state == DecoderState::AwaitingAudio {
            debug!(
                received = self.audio.len(),
                target = self.target,
                "Discarding partial audio"
            );
        }
        self.buffer.clear();
        self.audio.clear();
        self.last_progress = 0;
        self.state = DecoderState::Idle;
    }

    /// Look for the first complete `<...>` token.
    ///
    /// Returns `true` if bytes were consumed and scanning should continue.
    fn scan_for_marker(&mut self) -> bool {
        let Some(close) = self.buffer.iter().position(|&b| b == MARKER_CLOSE) else {
            self.trim_pending_prefix();
            return false;
        };

        let Some(open) = self.buffer[..close].iter().rposition(|&b| b == MARKER_OPEN) else {
            // A lone '>' can never close a marker.
            self.buffer.advance(close + 1);
            return true;
        };

        self.buffer.advance(open);
        let token = self.buffer.split_to(close - open + 1).freeze();

        if token.as_ref() == MOTION_MARKER {
            self.events.push_back(DecodedEvent::Motion);
        } else if token.as_ref() == AUDIO_MARKER {
            self.events.push_back(DecodedEvent::AudioHeader);
            self.begin_audio();
        } else {
            debug!(token = %String::from_utf8_lossy(&token), "Unknown serial marker");
            self.events.push_back(DecodedEvent::Unknown(token));
        }
        true
    }

    /// Keep only a `<...` prefix that could still become a marker.
    fn trim_pending_prefix(&mut self) {
        match self.buffer.iter().rposition(|&b| b == MARKER_OPEN) {
            Some(open) => {
                self.buffer.advance(open);
                if self.buffer.len() > MAX_MARKER_LENGTH {
                    self.buffer.clear();
                }
            }
            None => self.buffer.clear(),
        }
    }

    fn begin_audio(&mut self) {
        self.state = DecoderState::AwaitingAudio;
        self.audio.clear();
        self.audio.reserve(self.target);
        self.last_progress = 0;
    }

    /// Move payload bytes into the audio buffer.
    ///
    /// Always returns `false`: either more bytes are needed or the excess
    /// after a completed block has been discarded.
    fn fill_audio(&mut self) -> bool {
        let needed = self.target - self.audio.len();
        let take = needed.min(self.buffer.len());
        let chunk = self.buffer.split_to(take);
        self.audio.extend_from_slice(&chunk);

        if self.audio.len() - self.last_progress >= PROGRESS_TRACE_STEP {
            self.last_progress = self.audio.len();
            trace!(
                received = self.audio.len(),
                target = self.target,
                "Audio buffer progress"
            );
        }

        if self.audio.len() < self.target {
            return false;
        }

        if !self.buffer.is_empty() {
            debug!(excess = self.buffer.len(), "Discarding bytes after audio block");
            self.buffer.clear();
        }
        let pcm = self.audio.split().freeze();
        self.events.push_back(DecodedEvent::AudioComplete(pcm));
        self.state = DecoderState::Idle;
        self.last_progress = 0;
        false
    }
}

impl Default for ProtocolDecoder {
    fn default() -> Self {
        Self::new(AudioBudget::default())
    }
}

/// Iterator returned by [`ProtocolDecoder::drain_events`].
pub struct DrainEvents<'a> {
    decoder: &'a mut ProtocolDecoder,
}

impl Iterator for DrainEvents<'_> {
    type Item = DecodedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_event()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.decoder.events_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainEvents<'_> {
    fn len(&self) -> usize {
        self.decoder.events_available()
    }
}
