use chrono::Utc;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::video::types::{FrameBuffer, FrameShape, PixelLayout};

/// Anything that pushes frames into the engine, one at a time, in
/// increasing sequence order.
pub trait FrameSource {
    /// Shape of every frame this source produces
    fn shape(&self) -> FrameShape;

    /// Next captured frame, or `None` once the source is exhausted
    fn next_frame(&mut self) -> Option<FrameBuffer>;
}

/// Synthetic capture source: scrolling color bars with optional sensor noise
///
/// Stands in for a webcam in the CLI, benchmarks and tests.
pub struct TestPattern {
    shape: FrameShape,
    sequence: u64,
    limit: Option<u64>,
    noise: u8,
    rng: SmallRng,
}

const BARS: [[u8; 3]; 7] = [
    [235, 235, 235],
    [235, 235, 16],
    [16, 235, 235],
    [16, 235, 16],
    [235, 16, 235],
    [235, 16, 16],
    [16, 16, 235],
];

impl TestPattern {
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self {
            shape: FrameShape::new(width, height, layout),
            sequence: 0,
            limit: None,
            noise: 0,
            rng: SmallRng::seed_from_u64(0x5eed),
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Add up to ±`amplitude` of per-pixel noise, like a cheap sensor
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise = amplitude;
        self
    }

    fn render(&mut self) -> Vec<u8> {
        let FrameShape { width, height, layout } = self.shape;
        let channels = layout.channels();
        let rgb = layout.rgb_indices();
        let mut data = vec![0u8; self.shape.byte_len()];
        let offset = (self.sequence * 2) as u32;

        for y in 0..height {
            for x in 0..width {
                let bar = (((x + offset) % width.max(1)) as usize * BARS.len()) / width.max(1) as usize;
                let mut color = BARS[bar];
                // Darken towards the bottom so rows differ
                let shade = 255 - (y * 96 / height.max(1)) as u8;
                for c in color.iter_mut() {
                    *c = (*c as u32 * shade as u32 / 255) as u8;
                }

                let start = (y as usize * width as usize + x as usize) * channels;
                let pixel = &mut data[start..start + channels];
                if layout == PixelLayout::Gray8 {
                    pixel[0] = crate::video::types::luma(color[0], color[1], color[2]);
                } else {
                    for (c, &idx) in rgb.iter().enumerate() {
                        pixel[idx] = color[c];
                    }
                    if let Some(a) = layout.alpha_index() {
                        pixel[a] = 255;
                    }
                }
            }
        }

        if self.noise > 0 {
            let amplitude = self.noise as i16;
            for (i, byte) in data.iter_mut().enumerate() {
                if layout.alpha_index() == Some(i % channels) {
                    continue;
                }
                let delta = self.rng.gen_range(-amplitude..=amplitude);
                *byte = (*byte as i16 + delta).clamp(0, 255) as u8;
            }
        }

        data
    }
}

impl FrameSource for TestPattern {
    fn shape(&self) -> FrameShape {
        self.shape
    }

    fn next_frame(&mut self) -> Option<FrameBuffer> {
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return None;
        }
        let data = self.render();
        let frame = FrameBuffer::from_raw(self.shape, data, self.sequence, Utc::now());
        self.sequence += 1;
        frame
    }
}

impl Iterator for TestPattern {
    type Item = FrameBuffer;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}
