//! Parameter activation rules.
//!
//! A parameter may depend on the current value of another parameter of the
//! same effect. Inactive parameters cannot influence the output, so the frame
//! processor leaves them out of cache keys and presentation layers hide them.

use std::collections::BTreeSet;

use crate::params::resolved::ResolvedParameterSet;
use crate::params::spec::ParameterSpec;
use crate::params::value::ParamValue;

/// Condition evaluated against the controlling parameter's value
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IsTrue,
    IsFalse,
    Equals(ParamValue),
    NotEquals(ParamValue),
    Contains(String),
    GreaterThan(f64),
    LessThan(f64),
}

impl Condition {
    pub fn evaluate(&self, value: &ParamValue) -> bool {
        match self {
            Condition::IsTrue => value.is_truthy(),
            Condition::IsFalse => !value.is_truthy(),
            Condition::Equals(expected) => value.loosely_equals(expected),
            Condition::NotEquals(expected) => !value.loosely_equals(expected),
            Condition::Contains(needle) => value.to_string().contains(needle.as_str()),
            Condition::GreaterThan(bound) => value.as_f64().is_some_and(|v| v > *bound),
            Condition::LessThan(bound) => value.as_f64().is_some_and(|v| v < *bound),
        }
    }
}

/// `(on, condition)`: active while `condition` holds for the value of `on`
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRule {
    pub on: String,
    pub condition: Condition,
}

impl DependencyRule {
    pub fn new(on: &str, condition: Condition) -> Self {
        Self {
            on: on.to_string(),
            condition,
        }
    }

    /// A rule on a key missing from `params` is never satisfied
    pub fn is_satisfied(&self, params: &ResolvedParameterSet) -> bool {
        params
            .get(&self.on)
            .is_some_and(|value| self.condition.evaluate(value))
    }
}

/// Whether a single parameter is currently active
pub fn is_active(spec: &ParameterSpec, params: &ResolvedParameterSet) -> bool {
    spec.dependency
        .as_ref()
        .map_or(true, |rule| rule.is_satisfied(params))
}

/// Keys of all parameters whose dependency currently holds
pub fn resolve_active(specs: &[ParameterSpec], params: &ResolvedParameterSet) -> BTreeSet<String> {
    specs
        .iter()
        .filter(|spec| is_active(spec, params))
        .map(|spec| spec.key.clone())
        .collect()
}
