//! PCM normalization and WAV encoding for captured audio.
//!
//! The microcontroller streams unsigned 16-bit little-endian samples. They
//! are mapped to `[-1, 1]` with `(sample / divisor) * 2 - 1` and written as
//! a mono IEEE-float WAV file.

use bytes::{BufMut, Bytes, BytesMut};

/// WAVE format tag for IEEE 754 float samples.
const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

const BITS_PER_SAMPLE: u16 = 32;
const CHANNELS: u16 = 1;

/// Size of the RIFF, fmt and data chunk headers.
const WAV_HEADER_LEN: usize = 44;

/// Normalize raw `u16` LE samples.
///
/// A trailing odd byte is ignored. Values above `divisor` map past `1.0`;
/// no clamping is applied so the output mirrors the firmware's calibration.
pub fn normalize_samples(pcm: &[u8], divisor: f64) -> Vec<f32> {
    pcm.chunks_exact(2)
        .map(|pair| {
            let sample = u16::from_le_bytes([pair[0], pair[1]]);
            ((f64::from(sample) / divisor) * 2.0 - 1.0) as f32
        })
        .collect()
}

/// Encode mono float samples as a WAV file.
pub fn encode_wav_f32(samples: &[f32], sample_rate: u32) -> Bytes {
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = (samples.len() * 4) as u32;

    let mut out = BytesMut::with_capacity(WAV_HEADER_LEN + samples.len() * 4);
    out.put_slice(b"RIFF");
    out.put_u32_le(36 + data_len);
    out.put_slice(b"WAVE");

    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(WAVE_FORMAT_IEEE_FLOAT);
    out.put_u16_le(CHANNELS);
    out.put_u32_le(sample_rate);
    out.put_u32_le(byte_rate);
    out.put_u16_le(block_align);
    out.put_u16_le(BITS_PER_SAMPLE);

    out.put_slice(b"data");
    out.put_u32_le(data_len);
    for sample in samples {
        out.put_f32_le(*sample);
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, -1.0)]
    #[case(1023, 1.0)]
    #[case(512, 0.000_977_5)]
    fn test_normalize_default_divisor(#[case] raw: u16, #[case] expected: f32) {
        let samples = normalize_samples(&raw.to_le_bytes(), 1023.0);
        assert_eq!(samples.len(), 1);
        assert!((samples[0] - expected).abs() < 1e-4, "{} vs {expected}", samples[0]);
    }

    #[test]
    fn test_normalize_full_scale() {
        let samples = normalize_samples(&u16::MAX.to_le_bytes(), 65535.0);
        assert!((samples[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_normalize_ignores_trailing_byte() {
        let samples = normalize_samples(&[0, 0, 0xff, 0x03, 0x07], 1023.0);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_wav_header() {
        let wav = encode_wav_f32(&[0.0, 0.5, -0.5], 8000);
        assert_eq!(wav.len(), WAV_HEADER_LEN + 12);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 12);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([wav[20], wav[21]]), WAVE_FORMAT_IEEE_FLOAT);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 8000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 32_000);
        assert_eq!(u16::from_le_bytes([wav[34], wav[35]]), 32);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 12);
        assert_eq!(f32::from_le_bytes(wav[48..52].try_into().unwrap()), 0.5);
    }
}
