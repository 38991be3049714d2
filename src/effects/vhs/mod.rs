//! # VHS Effect
//!
//! Analog tape look: darkened scan lines, smeared chroma, horizontal tracking
//! tears and tape noise. Presets pick the strength; `Custom` exposes every knob.

mod effect;

pub use effect::VhsEffect;

// Parameter keys
pub const MODE: &str = "mode";
pub const INTENSITY: &str = "intensity";
pub const SCANLINE_INTENSITY: &str = "scanline_intensity";
pub const COLOR_BLEEDING: &str = "color_bleeding";
pub const TRACKING_ERROR: &str = "tracking_error";
pub const NOISE_LEVEL: &str = "noise_level";
pub const CHROMA_SHIFT: &str = "chroma_shift";
pub const SATURATION_BOOST: &str = "saturation_boost";

/// Mode whose individual settings come from the custom parameters
pub const CUSTOM_MODE: &str = "Custom";
