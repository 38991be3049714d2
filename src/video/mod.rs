//! # Video Frames
//!
//! Frame buffers exchanged with the capture source and output sinks, plus the
//! cheap content fingerprint used for caching.

pub mod fingerprint;
pub mod sink;
pub mod source;
pub mod types;

pub use fingerprint::FrameFingerprint;
pub use sink::{FrameSink, NullSink, PngSequenceSink};
pub use source::{FrameSource, TestPattern};
pub use types::{luma, FrameBuffer, FrameShape, PixelLayout};
