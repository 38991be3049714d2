//! # Frame Pipeline
//!
//! Turns captured frames into processed frames: parameter resolution, the
//! output cache, effect dispatch (inline or on per-effect workers) and fault
//! isolation.

pub mod cache;
pub mod health;
pub mod processor;
pub mod scratch;
pub mod worker;

pub use cache::{CacheKey, FrameCache};
pub use health::{FaultRecord, HealthMonitor};
pub use processor::{FrameProcessor, ProcessingResult, ProcessorState, ProcessorStats, Selection};
pub use scratch::ScratchPool;
pub use worker::{execute, WorkerPool};
