//! # Blur
//!
//! Box and approximate Gaussian blur. The radius and pass count are cost
//! parameters that lower quality tiers cap.

mod effect;

pub use effect::BlurEffect;

// Parameter keys
pub const KIND: &str = "kind";
pub const RADIUS: &str = "radius";
pub const PASSES: &str = "passes";

// Number of box passes used to approximate a Gaussian
pub const GAUSSIAN_PASSES: i64 = 3;
