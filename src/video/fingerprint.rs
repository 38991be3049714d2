use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::video::types::{FrameBuffer, FrameShape};

/// Bytes read at each sample point
const SAMPLE_WIDTH: usize = 8;

/// Cheap, non-cryptographic summary of frame content used in cache keys
///
/// Covers the frame shape plus a checksum over evenly spaced samples of the
/// pixel data, so lookup cost does not grow with resolution. Frames that only
/// differ between sample points share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameFingerprint {
    pub shape: FrameShape,
    pub checksum: u64,
}

impl FrameFingerprint {
    /// Fingerprint `frame` using at most `samples` sample points
    pub fn of(frame: &FrameBuffer, samples: usize) -> Self {
        let data = frame.data();
        let mut hasher = DefaultHasher::new();

        if samples == 0 || data.len() <= samples * SAMPLE_WIDTH {
            data.hash(&mut hasher);
        } else {
            let spacing = data.len() / samples;
            for i in 0..samples {
                let start = i * spacing;
                let end = (start + SAMPLE_WIDTH).min(data.len());
                data[start..end].hash(&mut hasher);
            }
            // The tail is where partial updates (overlays, tickers) usually land
            data[data.len() - SAMPLE_WIDTH..].hash(&mut hasher);
        }

        Self {
            shape: frame.shape(),
            checksum: hasher.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::PixelLayout;

    #[test]
    fn test_identical_frames_share_fingerprint() {
        let a = FrameBuffer::new_filled(64, 48, PixelLayout::Rgb8, [10, 20, 30]).with_sequence(1);
        let b = FrameBuffer::new_filled(64, 48, PixelLayout::Rgb8, [10, 20, 30]).with_sequence(2);
        assert_eq!(FrameFingerprint::of(&a, 256), FrameFingerprint::of(&b, 256));
    }

    #[test]
    fn test_content_and_shape_change_fingerprint() {
        let a = FrameBuffer::new_filled(64, 48, PixelLayout::Rgb8, [10, 20, 30]);
        let b = FrameBuffer::new_filled(64, 48, PixelLayout::Rgb8, [11, 20, 30]);
        let c = FrameBuffer::new_filled(48, 64, PixelLayout::Rgb8, [10, 20, 30]);

        let fa = FrameFingerprint::of(&a, 256);
        assert_ne!(fa, FrameFingerprint::of(&b, 256));
        assert_ne!(fa, FrameFingerprint::of(&c, 256));
    }
}
