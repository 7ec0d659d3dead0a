//! Data types exchanged with the camera and the recognizer.

use chrono::{DateTime, Utc};

/// Bytes per RGB888 pixel.
pub const RGB_CHANNELS: usize = 3;

/// One RGB888 camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB888 pixels, `width * height * 3` bytes.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame, checking the pixel buffer length.
    ///
    /// Returns `None` when `data` does not hold exactly `width * height`
    /// RGB pixels.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * RGB_CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        })
    }

    /// Frame filled with a single grey level.
    pub fn solid(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            data: vec![level; width as usize * height as usize * RGB_CHANNELS],
            captured_at: Utc::now(),
        }
    }

    /// Nearest-neighbour downsample by an integer factor.
    ///
    /// A factor of `0` or `1` returns a copy. Dimensions never drop below one
    /// pixel.
    pub fn downsample(&self, factor: u32) -> Frame {
        if factor <= 1 {
            return self.clone();
        }

        let width = (self.width / factor).max(1);
        let height = (self.height / factor).max(1);
        let mut data = Vec::with_capacity(width as usize * height as usize * RGB_CHANNELS);

        for y in 0..height {
            let src_y = (y * factor).min(self.height.saturating_sub(1)) as usize;
            for x in 0..width {
                let src_x = (x * factor).min(self.width.saturating_sub(1)) as usize;
                let offset = (src_y * self.width as usize + src_x) * RGB_CHANNELS;
                data.extend_from_slice(&self.data[offset..offset + RGB_CHANNELS]);
            }
        }

        Frame {
            width,
            height,
            data,
            captured_at: self.captured_at,
        }
    }
}

/// Bounding box of a detected face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Box covering a whole frame.
    pub fn full_frame(frame: &Frame) -> Self {
        Self {
            top: 0,
            right: frame.width,
            bottom: frame.height,
            left: 0,
        }
    }
}

/// Result of comparing a known encoding with a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceComparison {
    pub distance: f64,
    pub is_match: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_checks_length() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_some());
        assert!(Frame::new(2, 2, vec![0; 11]).is_none());
    }

    #[rstest]
    #[case(640, 480, 5, 128, 96)]
    #[case(10, 10, 1, 10, 10)]
    #[case(3, 3, 5, 1, 1)]
    fn test_downsample_dimensions(
        #[case] width: u32,
        #[case] height: u32,
        #[case] factor: u32,
        #[case] expected_width: u32,
        #[case] expected_height: u32,
    ) {
        let small = Frame::solid(width, height, 7).downsample(factor);
        assert_eq!(small.width, expected_width);
        assert_eq!(small.height, expected_height);
        assert_eq!(
            small.data.len(),
            (expected_width * expected_height) as usize * RGB_CHANNELS
        );
        assert!(small.data.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_downsample_picks_nearest_pixel() {
        // 2x1 frame: red then blue.
        let frame = Frame::new(2, 1, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let small = frame.downsample(2);
        assert_eq!(small.data, vec![255, 0, 0]);
    }
}
