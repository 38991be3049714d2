//! # Effects
//!
//! The effect contract, the catalog of compiled implementations, manifest
//! loading and the registry the processor looks effects up in.

pub mod catalog;
pub mod manifest;
pub mod pixel;
pub mod registry;
pub mod traits;

pub mod adjust;
pub mod blur;
pub mod edges;
pub mod vhs;

pub use catalog::EffectCatalog;
pub use manifest::{ManifestEffect, MANIFEST_FILE};
pub use registry::{EffectRegistry, RegisteredEffect, RegistrationReport, RegistryStats};
pub use traits::{Effect, EffectDescriptor};

pub use adjust::BrightnessContrastEffect;
pub use blur::BlurEffect;
pub use edges::EdgeDetectionEffect;
pub use vhs::VhsEffect;
