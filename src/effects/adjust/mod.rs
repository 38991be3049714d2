//! # Brightness / Contrast
//!
//! Point adjustments of brightness, contrast and saturation.

mod effect;

pub use effect::BrightnessContrastEffect;

// Parameter keys
pub const BRIGHTNESS: &str = "brightness";
pub const CONTRAST: &str = "contrast";
pub const SATURATION: &str = "saturation";
