//! Property-based tests for the serial stream decoder.
//!
//! The serial link delivers bytes in arbitrary chunk sizes, so every
//! property here feeds the same logical stream split at random points.

use bytes::Bytes;
use proptest::prelude::*;
use smartlock_core::{
    AudioBudget,
    constants::{AUDIO_MARKER, MAX_MARKER_LENGTH, MOTION_MARKER},
};
use smartlock_protocol::{DecodedEvent, DecoderState, ProtocolDecoder};

/// Budget small enough to keep cases fast: 64 samples, 128 bytes.
const BUDGET: AudioBudget = AudioBudget {
    sample_rate: 64,
    duration_secs: 1,
};

/// Split `data` into consecutive chunks at the given cut points.
fn split_at_points(data: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.retain(|&c| c > 0 && c < data.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

/// Noise that contains no marker brackets.
fn bracket_free_noise() -> impl Strategy<Value = Vec<u8>> {
    let byte = any::<u8>().prop_filter("no brackets", |b| *b != b'<' && *b != b'>');
    prop::collection::vec(byte, 0..64)
}

proptest! {
    /// A motion episode decodes to the same events however it is chunked.
    ///
    /// Trailing bytes may land in the same chunk as the end of the payload
    /// (dropped as excess) or in a later one (scanned as idle noise).
    #[test]
    fn prop_episode_independent_of_chunking(
        payload in prop::collection::vec(any::<u8>(), BUDGET.byte_len()),
        excess in bracket_free_noise(),
        cuts in prop::collection::vec(0usize..512, 0..24),
    ) {
        let mut stream = Vec::new();
        stream.extend_from_slice(MOTION_MARKER);
        stream.extend_from_slice(AUDIO_MARKER);
        stream.extend_from_slice(&payload);
        stream.extend_from_slice(&excess);

        let mut decoder = ProtocolDecoder::new(BUDGET);
        for chunk in split_at_points(&stream, cuts) {
            decoder.feed(chunk);
        }

        let events: Vec<_> = decoder.drain_events().collect();
        prop_assert_eq!(
            events,
            vec![
                DecodedEvent::Motion,
                DecodedEvent::AudioHeader,
                DecodedEvent::AudioComplete(Bytes::from(payload)),
            ]
        );
        prop_assert_eq!(decoder.state(), DecoderState::Idle);
    }

    /// Audio completes exactly once, with exactly the budget, never early.
    #[test]
    fn prop_audio_completes_exactly_at_budget(
        chunk_len in 1usize..200,
    ) {
        let payload = vec![0x5au8; BUDGET.byte_len()];
        let mut decoder = ProtocolDecoder::new(BUDGET);
        decoder.feed(AUDIO_MARKER);
        prop_assert_eq!(decoder.next_event(), Some(DecodedEvent::AudioHeader));

        let mut fed = 0;
        for chunk in payload.chunks(chunk_len) {
            prop_assert!(decoder.next_event().is_none());
            decoder.feed(chunk);
            fed += chunk.len();
            if fed < BUDGET.byte_len() {
                prop_assert_eq!(decoder.audio_progress(), Some((fed, BUDGET.byte_len())));
            }
        }

        match decoder.next_event() {
            Some(DecodedEvent::AudioComplete(pcm)) => prop_assert_eq!(pcm.len(), BUDGET.byte_len()),
            other => prop_assert!(false, "unexpected event {:?}", other),
        }
        prop_assert!(decoder.next_event().is_none());
    }

    /// Noise between markers never produces or suppresses a motion event.
    #[test]
    fn prop_noise_between_motion_markers(
        noise in prop::collection::vec(bracket_free_noise(), 1..5),
        cuts in prop::collection::vec(0usize..400, 0..16),
    ) {
        let mut stream = Vec::new();
        for segment in &noise {
            stream.extend_from_slice(segment);
            stream.extend_from_slice(MOTION_MARKER);
        }

        let mut decoder = ProtocolDecoder::new(BUDGET);
        for chunk in split_at_points(&stream, cuts) {
            decoder.feed(chunk);
        }

        let events: Vec<_> = decoder.drain_events().collect();
        prop_assert_eq!(events.len(), noise.len());
        prop_assert!(events.iter().all(|e| *e == DecodedEvent::Motion));
    }

    /// Arbitrary input never grows the idle buffer past the longest marker.
    #[test]
    fn prop_idle_buffer_is_bounded(
        chunks in prop::collection::vec(
            prop::collection::vec(any::<u8>().prop_filter("no close", |b| *b != b'>'), 0..128),
            1..16,
        ),
    ) {
        let mut decoder = ProtocolDecoder::new(BUDGET);
        for chunk in &chunks {
            decoder.feed(chunk);
            prop_assert_eq!(decoder.state(), DecoderState::Idle);
            prop_assert!(decoder.pending_len() <= MAX_MARKER_LENGTH);
        }
    }
}
