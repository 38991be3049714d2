//! # Parameter Schema
//!
//! Declarative parameter specs, fail-soft validation of raw values and the
//! dependency rules that decide which parameters are currently active.

pub mod dependency;
pub mod resolved;
pub mod spec;
pub mod store;
pub mod value;

pub use dependency::{is_active, resolve_active, Condition, DependencyRule};
pub use resolved::{resolve, resolve_with_report, Resolution, ResolvedParameterSet};
pub use spec::{validate, ParamKind, ParameterSpec, DEFAULT_CATEGORY};
pub use store::ParameterStore;
pub use value::{parse_hex_color, ParamValue, RawParameters, Rgb};
