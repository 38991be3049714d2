use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use tracing::debug;

use crate::error::ValidationError;
use crate::params::spec::ParameterSpec;
use crate::params::value::{ParamValue, RawParameters, Rgb};

/// Validated, in-bounds parameter values for one effect instance
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ResolvedParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value without validation. Effects and tests use this to
    /// build sets by hand; the pipeline only ever goes through [`resolve`].
    pub fn insert<K: Into<String>, V: Into<ParamValue>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_color(&self, key: &str) -> Option<Rgb> {
        self.get(key).and_then(|v| v.as_color())
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// Stable digest over the given subset of keys, in key order
    pub fn digest(&self, keys: &BTreeSet<String>) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (key, value) in self.values.iter().filter(|(k, _)| keys.contains(*k)) {
            key.hash(&mut hasher);
            value.hash_into(&mut hasher);
        }
        hasher.finish()
    }
}

/// Outcome of resolving a raw map, with the substitutions that were made
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub params: ResolvedParameterSet,
    pub substitutions: Vec<ValidationError>,
}

/// Validate a raw map against a parameter schema.
///
/// Missing keys take defaults, values that cannot be coerced are replaced by
/// the default, and keys not in the schema are ignored.
pub fn resolve_with_report(specs: &[ParameterSpec], raw: &RawParameters) -> Resolution {
    let mut resolution = Resolution::default();

    for spec in specs {
        let value = match raw.get(&spec.key) {
            None => spec.default.clone(),
            Some(raw_value) => match spec.validate(raw_value) {
                Ok(value) => value,
                Err(e) => {
                    debug!(key = %spec.key, error = %e, "Substituting parameter default");
                    resolution.substitutions.push(e);
                    spec.default.clone()
                }
            },
        };
        resolution.params.values.insert(spec.key.clone(), value);
    }

    resolution
}

/// [`resolve_with_report`] without the substitution report
pub fn resolve(specs: &[ParameterSpec], raw: &RawParameters) -> ResolvedParameterSet {
    resolve_with_report(specs, raw).params
}
