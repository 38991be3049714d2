use std::fmt;

use chrono::{DateTime, Utc};
use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Byte order of the channels in each pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Rgb8,
    Bgr8,
    Rgba8,
    Gray8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Bgr8 => 3,
            PixelLayout::Rgba8 => 4,
            PixelLayout::Gray8 => 1,
        }
    }

    /// Index of the red, green and blue bytes within a pixel
    pub fn rgb_indices(self) -> [usize; 3] {
        match self {
            PixelLayout::Rgb8 | PixelLayout::Rgba8 => [0, 1, 2],
            PixelLayout::Bgr8 => [2, 1, 0],
            PixelLayout::Gray8 => [0, 0, 0],
        }
    }

    /// Index of a channel that effects must leave alone (alpha)
    pub fn alpha_index(self) -> Option<usize> {
        match self {
            PixelLayout::Rgba8 => Some(3),
            _ => None,
        }
    }
}

/// Dimensions and layout of a frame; fixed for a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl FrameShape {
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Self {
        Self { width, height, layout }
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels()
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{} {:?}", self.width, self.height, self.channels(), self.layout)
    }
}

/// A single video frame travelling through the pipeline
///
/// Owned by whichever stage currently holds it. Published outputs are
/// wrapped in an `Arc` so several sinks can read the same frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    shape: FrameShape,
    sequence: u64,
    timestamp: DateTime<Utc>,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap raw interleaved pixel bytes. Returns `None` when the byte count
    /// does not match the shape.
    pub fn from_raw(shape: FrameShape, data: Vec<u8>, sequence: u64, timestamp: DateTime<Utc>) -> Option<Self> {
        if data.len() != shape.byte_len() {
            return None;
        }
        Some(Self {
            shape,
            sequence,
            timestamp,
            data,
        })
    }

    /// Create a new frame with the given shape filled with black
    pub fn blank(shape: FrameShape) -> Self {
        Self {
            shape,
            sequence: 0,
            timestamp: Utc::now(),
            data: vec![0; shape.byte_len()],
        }
    }

    /// Create a new frame filled with the given RGB color
    pub fn new_filled(width: u32, height: u32, layout: PixelLayout, color: [u8; 3]) -> Self {
        let shape = FrameShape::new(width, height, layout);
        let mut frame = Self::blank(shape);
        let rgb = layout.rgb_indices();
        let alpha = layout.alpha_index();
        let gray = luma(color[0], color[1], color[2]);

        for pixel in frame.data.chunks_exact_mut(layout.channels()) {
            if layout == PixelLayout::Gray8 {
                pixel[0] = gray;
                continue;
            }
            for (c, &idx) in rgb.iter().enumerate() {
                pixel[idx] = color[c];
            }
            if let Some(a) = alpha {
                pixel[a] = 255;
            }
        }
        frame
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn channels(&self) -> usize {
        self.shape.channels()
    }

    pub fn layout(&self) -> PixelLayout {
        self.shape.layout
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.shape.width as usize * self.channels()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Get the channel bytes of the pixel at the given coordinates
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = self.offset(x, y);
        &self.data[start..start + self.channels()]
    }

    /// Get a mutable reference to a pixel at the given coordinates
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let start = self.offset(x, y);
        let channels = self.channels();
        &mut self.data[start..start + channels]
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Overwrite pixels and identity from a frame of the same shape.
    /// Returns false (and leaves `self` untouched) on shape mismatch.
    pub fn copy_from(&mut self, other: &FrameBuffer) -> bool {
        if self.shape != other.shape {
            return false;
        }
        self.data.copy_from_slice(&other.data);
        self.sequence = other.sequence;
        self.timestamp = other.timestamp;
        true
    }

    /// Same pixels under a different sequence number and timestamp
    pub fn restamped(&self, sequence: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            shape: self.shape,
            sequence,
            timestamp,
            data: self.data.clone(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Compare shape and pixels, ignoring sequence number and timestamp
    pub fn same_pixels(&self, other: &FrameBuffer) -> bool {
        self.shape == other.shape && self.data == other.data
    }

    /// Mean luma over the whole frame (0-255)
    pub fn mean_luma(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let rgb = self.layout().rgb_indices();
        let total: u64 = self
            .data
            .chunks_exact(self.channels())
            .map(|p| luma(p[rgb[0]], p[rgb[1]], p[rgb[2]]) as u64)
            .sum();
        total as f64 / (self.width() as f64 * self.height() as f64)
    }

    /// Convert to an RGB image buffer (alpha dropped, gray expanded)
    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb = self.layout().rgb_indices();
        let channels = self.channels();
        ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            let start = (y as usize * self.width() as usize + x as usize) * channels;
            let p = &self.data[start..start + channels];
            Rgb([p[rgb[0]], p[rgb[1]], p[rgb[2]]])
        })
    }

    /// Create an RGB frame from an image buffer
    pub fn from_rgb_image(image: RgbImage, sequence: u64) -> Self {
        let shape = FrameShape::new(image.width(), image.height(), PixelLayout::Rgb8);
        Self {
            shape,
            sequence,
            timestamp: Utc::now(),
            data: image.into_raw(),
        }
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.to_rgb_image().save(path)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.shape.width as usize + x as usize) * self.channels()
    }
}

/// Rec. 601 luma
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}
