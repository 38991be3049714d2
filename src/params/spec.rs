use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::params::dependency::{Condition, DependencyRule};
use crate::params::value::{parse_hex_color, ParamValue, Rgb};
use crate::performance::QualityTier;

/// Grouping label used when a parameter does not name one
pub const DEFAULT_CATEGORY: &str = "General";

/// The kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Integer,
    Real,
    Boolean,
    Enum,
    FilePath,
    Color,
}

impl ParamKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ParamKind::Integer | ParamKind::Real)
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Integer => "integer",
            ParamKind::Real => "real",
            ParamKind::Boolean => "boolean",
            ParamKind::Enum => "enum",
            ParamKind::FilePath => "file path",
            ParamKind::Color => "color",
        }
    }
}

/// Declarative description of a single tunable value
///
/// Specs are built with the kind constructors and refined with the `with_*`
/// builders:
///
/// ```rust
/// use framekit::params::{Condition, ParameterSpec};
///
/// let radius = ParameterSpec::integer("blur_radius", 2, 1, 7)
///     .in_category("Detection")
///     .depends_on("blur_preprocessing", Condition::IsTrue);
/// assert!(radius.check().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub key: String,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub options: Vec<String>,
    pub category: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub dependency: Option<DependencyRule>,
    /// Values forced by the performance optimizer at reduced quality tiers.
    /// Only numeric cost parameters may carry these.
    pub tier_overrides: BTreeMap<QualityTier, ParamValue>,
}

impl ParameterSpec {
    fn base(key: &str, kind: ParamKind, default: ParamValue) -> Self {
        Self {
            key: key.to_string(),
            kind,
            default,
            min: None,
            max: None,
            step: None,
            options: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            label: None,
            description: None,
            dependency: None,
            tier_overrides: BTreeMap::new(),
        }
    }

    pub fn integer(key: &str, default: i64, min: i64, max: i64) -> Self {
        Self {
            min: Some(min as f64),
            max: Some(max as f64),
            step: Some(1.0),
            ..Self::base(key, ParamKind::Integer, ParamValue::Integer(default))
        }
    }

    pub fn real(key: &str, default: f64, min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::base(key, ParamKind::Real, ParamValue::Float(default))
        }
    }

    pub fn boolean(key: &str, default: bool) -> Self {
        Self::base(key, ParamKind::Boolean, ParamValue::Bool(default))
    }

    pub fn choice(key: &str, default: &str, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Self::base(key, ParamKind::Enum, ParamValue::from(default))
        }
    }

    pub fn file_path(key: &str, default: &str) -> Self {
        Self::base(key, ParamKind::FilePath, ParamValue::from(default))
    }

    pub fn color(key: &str, default: Rgb) -> Self {
        Self::base(key, ParamKind::Color, ParamValue::Color(default))
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn depends_on(mut self, on: &str, condition: Condition) -> Self {
        self.dependency = Some(DependencyRule::new(on, condition));
        self
    }

    pub fn with_tier_override<V: Into<ParamValue>>(mut self, tier: QualityTier, value: V) -> Self {
        self.tier_overrides.insert(tier, value.into());
        self
    }

    /// Human readable label, falling back to the key
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    /// Whether the optimizer may override this parameter
    pub fn is_cost_parameter(&self) -> bool {
        self.kind.is_numeric() && !self.tier_overrides.is_empty()
    }

    /// Coerce a raw value into this parameter's kind and bounds.
    ///
    /// Numeric values are clamped and snapped to `step`, never rejected for
    /// being out of range. Unknown enum options fall back to the default.
    pub fn validate(&self, raw: &ParamValue) -> Result<ParamValue, ValidationError> {
        match self.kind {
            ParamKind::Integer => {
                let value = self.coerce_number(raw)?;
                Ok(ParamValue::Integer(self.quantize(value).round() as i64))
            }
            ParamKind::Real => {
                let value = self.coerce_number(raw)?;
                let snapped = self.quantize(value);
                // Trim accumulated step error (0.30000000000000004 and friends);
                // trimming can cross a bound with more than 9 decimals
                let trimmed = (snapped * 1e9).round() / 1e9;
                Ok(ParamValue::Float(self.clamp_to_bounds(trimmed)))
            }
            ParamKind::Boolean => coerce_bool(raw).ok_or_else(|| self.mismatch(raw)).map(ParamValue::Bool),
            ParamKind::Enum => match raw.as_str() {
                Some(option) if self.options.iter().any(|o| o == option) => Ok(raw.clone()),
                _ => Ok(self.default.clone()),
            },
            ParamKind::FilePath => match raw {
                ParamValue::String(_) => Ok(raw.clone()),
                _ => Err(self.mismatch(raw)),
            },
            ParamKind::Color => raw
                .as_color()
                .map(ParamValue::Color)
                .ok_or_else(|| self.mismatch(raw)),
        }
    }

    /// Check that this spec is internally consistent: bounds are ordered,
    /// the default satisfies them, and tier overrides sit on numeric kinds.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("parameter key is empty".to_string());
        }

        match self.kind {
            ParamKind::Integer | ParamKind::Real => {
                let (min, max) = match (self.min, self.max) {
                    (Some(min), Some(max)) => (min, max),
                    _ => return Err(format!("'{}' is numeric but has no bounds", self.key)),
                };
                if !(min <= max) {
                    return Err(format!("'{}' has min {} above max {}", self.key, min, max));
                }
                if let Some(step) = self.step {
                    if !(step > 0.0) {
                        return Err(format!("'{}' has non-positive step {}", self.key, step));
                    }
                }
                let default = self
                    .default
                    .as_f64()
                    .ok_or_else(|| format!("'{}' default is not a number", self.key))?;
                if default < min || default > max {
                    return Err(format!(
                        "'{}' default {} outside [{}, {}]",
                        self.key, default, min, max
                    ));
                }
                for (tier, value) in &self.tier_overrides {
                    match value.as_f64() {
                        Some(v) if v >= min && v <= max => {}
                        _ => {
                            return Err(format!(
                                "'{}' override for {} tier is out of bounds: {}",
                                self.key, tier, value
                            ))
                        }
                    }
                }
            }
            ParamKind::Enum => {
                if self.options.is_empty() {
                    return Err(format!("'{}' is an enum without options", self.key));
                }
                match self.default.as_str() {
                    Some(d) if self.options.iter().any(|o| o == d) => {}
                    _ => {
                        return Err(format!(
                            "'{}' default {} is not one of {:?}",
                            self.key, self.default, self.options
                        ))
                    }
                }
            }
            ParamKind::Boolean | ParamKind::FilePath | ParamKind::Color => {
                self.validate(&self.default).map_err(|e| e.to_string())?;
            }
        }

        if !self.kind.is_numeric() && !self.tier_overrides.is_empty() {
            return Err(format!(
                "'{}' is a {} parameter and cannot carry quality overrides",
                self.key,
                self.kind.name()
            ));
        }

        if let Some(rule) = &self.dependency {
            if rule.on == self.key {
                return Err(format!("'{}' depends on itself", self.key));
            }
        }

        Ok(())
    }

    fn coerce_number(&self, raw: &ParamValue) -> Result<f64, ValidationError> {
        let value = match raw {
            ParamValue::Integer(i) => *i as f64,
            ParamValue::Float(f) => *f,
            ParamValue::String(s) => s.trim().parse::<f64>().map_err(|_| self.mismatch(raw))?,
            _ => return Err(self.mismatch(raw)),
        };
        if value.is_nan() {
            return Err(ValidationError::Unrepresentable {
                key: self.key.clone(),
                details: "NaN".to_string(),
            });
        }
        Ok(value)
    }

    fn clamp_to_bounds(&self, value: f64) -> f64 {
        value.clamp(self.min.unwrap_or(f64::NEG_INFINITY), self.max.unwrap_or(f64::INFINITY))
    }

    fn quantize(&self, value: f64) -> f64 {
        let min = self.min.unwrap_or(f64::NEG_INFINITY);
        let max = self.max.unwrap_or(f64::INFINITY);
        let clamped = value.clamp(min, max);

        match self.step {
            Some(step) if step > 0.0 && min.is_finite() => {
                let steps = ((clamped - min) / step).round();
                (min + steps * step).clamp(min, max)
            }
            _ => clamped,
        }
    }

    fn mismatch(&self, raw: &ParamValue) -> ValidationError {
        ValidationError::TypeMismatch {
            key: self.key.clone(),
            expected: self.kind.name().to_string(),
            got: format!("{} {}", raw.type_name(), raw),
        }
    }
}

/// Free-function form of [`ParameterSpec::validate`]
pub fn validate(spec: &ParameterSpec, raw: &ParamValue) -> Result<ParamValue, ValidationError> {
    spec.validate(raw)
}

fn coerce_bool(raw: &ParamValue) -> Option<bool> {
    match raw {
        ParamValue::Bool(b) => Some(*b),
        ParamValue::Integer(1) => Some(true),
        ParamValue::Integer(0) => Some(false),
        ParamValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_are_clamped() {
        let spec = ParameterSpec::integer("blur_strength", 5, 1, 15);

        let raws = [
            ParamValue::Integer(-1000),
            ParamValue::Integer(1000),
            ParamValue::Float(7.4),
            ParamValue::Float(f64::INFINITY),
            ParamValue::Float(f64::NEG_INFINITY),
            ParamValue::from("12"),
            ParamValue::Integer(i64::MAX),
        ];

        for raw in raws {
            let value = spec.validate(&raw).unwrap().as_f64().unwrap();
            assert!((1.0..=15.0).contains(&value), "{raw:?} -> {value}");
        }
    }

    #[test]
    fn test_real_values_snap_to_step() {
        let spec = ParameterSpec::real("contrast", 1.0, 0.5, 3.0).with_step(0.1);

        assert_eq!(spec.validate(&ParamValue::Float(1.26)).unwrap(), ParamValue::Float(1.3));
        assert_eq!(spec.validate(&ParamValue::Float(9.0)).unwrap(), ParamValue::Float(3.0));
        assert_eq!(spec.validate(&ParamValue::Integer(0)).unwrap(), ParamValue::Float(0.5));
    }

    #[test]
    fn test_fine_grained_bounds_hold_after_trimming() {
        let spec = ParameterSpec::real("x", 0.0, 0.0, 0.1234567896);
        let value = spec.validate(&ParamValue::Float(1.0)).unwrap().as_f64().unwrap();
        assert!(value <= 0.1234567896, "{value}");

        let spec = ParameterSpec::real("y", 0.0, -0.0000000006, 1.0);
        let value = spec.validate(&ParamValue::Float(-5.0)).unwrap().as_f64().unwrap();
        assert!(value >= -0.0000000006, "{value}");
    }

    #[test]
    fn test_integer_step_from_min() {
        let spec = ParameterSpec::integer("brightness", 0, -100, 100).with_step(5.0);
        assert_eq!(spec.validate(&ParamValue::Integer(13)).unwrap(), ParamValue::Integer(15));
        assert_eq!(spec.validate(&ParamValue::Integer(-12)).unwrap(), ParamValue::Integer(-10));
    }

    #[test]
    fn test_nan_is_rejected() {
        let spec = ParameterSpec::real("gamma", 1.0, 0.1, 3.0);
        assert!(spec.validate(&ParamValue::Float(f64::NAN)).is_err());
        assert!(spec.validate(&ParamValue::from("lots")).is_err());
    }

    #[test]
    fn test_enum_falls_back_to_default() {
        let spec = ParameterSpec::choice("blur_type", "Gaussian", &["Gaussian", "Box", "Median"]);

        assert_eq!(spec.validate(&ParamValue::from("Box")).unwrap(), ParamValue::from("Box"));
        assert_eq!(spec.validate(&ParamValue::from("Bilateral")).unwrap(), ParamValue::from("Gaussian"));
        assert_eq!(spec.validate(&ParamValue::Integer(2)).unwrap(), ParamValue::from("Gaussian"));
    }

    #[test]
    fn test_boolean_coercion() {
        let spec = ParameterSpec::boolean("auto_adjust", false);

        assert_eq!(spec.validate(&ParamValue::Integer(1)).unwrap(), ParamValue::Bool(true));
        assert_eq!(spec.validate(&ParamValue::from("FALSE")).unwrap(), ParamValue::Bool(false));
        assert_eq!(spec.validate(&ParamValue::from("0")).unwrap(), ParamValue::Bool(false));
        assert!(spec.validate(&ParamValue::Integer(2)).is_err());
        assert!(spec.validate(&ParamValue::from("yes")).is_err());
    }

    #[test]
    fn test_color_and_path() {
        let color = ParameterSpec::color("edge_color", [255, 255, 255]);
        assert_eq!(color.validate(&ParamValue::from("#102030")).unwrap(), ParamValue::Color([16, 32, 48]));
        assert!(color.validate(&ParamValue::Integer(3)).is_err());

        let path = ParameterSpec::file_path("overlay", "");
        assert!(path.validate(&ParamValue::from("/tmp/logo.png")).is_ok());
        assert!(path.validate(&ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn test_check_rejects_out_of_bounds_default() {
        let spec = ParameterSpec::integer("radius", 20, 1, 15);
        assert!(spec.check().is_err());

        let spec = ParameterSpec::choice("mode", "Other", &["A", "B"]);
        assert!(spec.check().is_err());

        let spec = ParameterSpec::boolean("flag", true).with_tier_override(QualityTier::Low, 1);
        assert!(spec.check().is_err());

        let spec = ParameterSpec::integer("radius", 5, 1, 15).with_tier_override(QualityTier::Low, 99);
        assert!(spec.check().is_err());

        let spec = ParameterSpec::integer("radius", 5, 1, 15).with_tier_override(QualityTier::Low, 2);
        assert!(spec.check().is_ok());
        assert!(spec.is_cost_parameter());
    }
}
