//! # Performance Optimizer
//!
//! Watches per-frame processing time and trades quality for speed through
//! discrete tiers whose parameter overrides the frame processor merges in.

pub mod optimizer;
pub mod tier;
pub mod window;

pub use optimizer::{overrides_at, PerformanceOptimizer, PerformanceSnapshot};
pub use tier::{QualityTier, TierChange};
pub use window::{PerformanceSample, SampleWindow};
