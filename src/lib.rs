//! # framekit
//!
//! Real-time video effect engine: pluggable effects with declarative
//! parameter schemas, a frame processor with output caching and fault
//! isolation, and adaptive quality control that keeps processing inside the
//! frame budget.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use framekit::{
//!     config::EngineConfig,
//!     effects::{EffectCatalog, EffectRegistry},
//!     params::RawParameters,
//!     pipeline::FrameProcessor,
//!     video::{FrameSource, PixelLayout, TestPattern},
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let (registry, _report) = EffectRegistry::init(config.registry.clone(), EffectCatalog::builtin())?;
//!
//! let mut processor = FrameProcessor::new(Arc::new(registry), config.processor, config.performance);
//! processor.select("vhs", RawParameters::new())?;
//!
//! let mut camera = TestPattern::new(640, 480, PixelLayout::Rgb8).with_limit(30);
//! while let Some(frame) = camera.next_frame() {
//!     let result = processor.process(frame);
//!     println!("frame {} in {:.1}ms", result.sequence, result.elapsed_ms);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`params`] - Parameter specs, validation and dependency rules
//! - [`effects`] - Effect trait, built-in effects, manifests and the registry
//! - [`pipeline`] - Frame processor, output cache and effect workers
//! - [`performance`] - Frame-time monitoring and quality tiers
//! - [`video`] - Frame buffers, capture sources and sinks
//! - [`config`] - Configuration management
//!
//! ## Writing an Effect
//!
//! Implement the [`Effect`](effects::Effect) trait and register it:
//!
//! ```rust,no_run
//! use framekit::effects::{Effect, EffectDescriptor};
//! use framekit::error::ApplyError;
//! use framekit::params::{ParameterSpec, ResolvedParameterSet};
//! use framekit::video::FrameBuffer;
//!
//! struct Posterize;
//!
//! impl Effect for Posterize {
//!     fn describe(&self) -> EffectDescriptor {
//!         EffectDescriptor::new("posterize", "Posterize", "Artistic", "1.0.0")
//!             .with_parameter(ParameterSpec::integer("levels", 4, 2, 16))
//!     }
//!
//!     fn apply(
//!         &self,
//!         _input: &FrameBuffer,
//!         params: &ResolvedParameterSet,
//!         output: &mut FrameBuffer,
//!     ) -> Result<(), ApplyError> {
//!         let step = 256 / params.get_i64_or("levels", 4) as u32;
//!         for value in output.data_mut() {
//!             *value = ((*value as u32 / step) * step) as u8;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

pub mod config;
pub mod effects;
pub mod error;
pub mod params;
pub mod performance;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::EngineConfig,
    effects::{Effect, EffectCatalog, EffectDescriptor, EffectRegistry},
    error::{EngineError, Result},
    pipeline::{FrameProcessor, ProcessingResult},
    video::FrameBuffer,
};
