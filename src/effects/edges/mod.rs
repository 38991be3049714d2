//! # Edge Detection
//!
//! Sobel or Laplacian edge maps drawn in a configurable color.

mod effect;

pub use effect::EdgeDetectionEffect;

// Parameter keys
pub const ALGORITHM: &str = "algorithm";
pub const THRESHOLD: &str = "threshold";
pub const BLUR_PREPROCESSING: &str = "blur_preprocessing";
pub const BLUR_RADIUS: &str = "blur_radius";
pub const EDGE_COLOR: &str = "edge_color";
pub const BACKGROUND: &str = "background";
pub const INVERT: &str = "invert";
