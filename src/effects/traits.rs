use std::collections::{BTreeSet, HashSet};

use crate::{
    error::ApplyError,
    params::{resolve, resolve_active, ParameterSpec, RawParameters, ResolvedParameterSet},
    video::FrameBuffer,
};

/// Core trait that all effects must implement
///
/// The engine only ever holds effects as `Arc<dyn Effect>`; everything it
/// needs to know about one comes from [`describe`](Effect::describe), which
/// the registry calls once at load time.
pub trait Effect: Send + Sync {
    /// Describe this effect: identity and parameter schema
    fn describe(&self) -> EffectDescriptor;

    /// Transform a frame
    ///
    /// # Arguments
    ///
    /// * `input` - The captured frame; never modified
    /// * `params` - Validated parameter values for this call
    /// * `output` - Scratch buffer with the same shape as `input`, pre-filled
    ///   with the input pixels. Write the result here.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` if the effect was applied successfully. On error the
    /// processor publishes the untouched input instead.
    fn apply(
        &self,
        input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError>;
}

/// Identity and parameter schema of an effect. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    /// Stable, globally unique id
    pub id: String,
    pub name: String,
    pub category: String,
    pub version: String,
    pub description: String,
    /// Parameters in presentation order
    pub parameters: Vec<ParameterSpec>,
}

impl EffectDescriptor {
    pub fn new(id: &str, name: &str, category: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            version: version.to_string(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn parameter_mut(&mut self, key: &str) -> Option<&mut ParameterSpec> {
        self.parameters.iter_mut().find(|p| p.key == key)
    }

    /// Validate a raw map against this effect's schema
    pub fn resolve(&self, raw: &RawParameters) -> ResolvedParameterSet {
        resolve(&self.parameters, raw)
    }

    /// Keys of the parameters that are active for these values
    pub fn active_keys(&self, params: &ResolvedParameterSet) -> BTreeSet<String> {
        resolve_active(&self.parameters, params)
    }

    /// Resolved default values
    pub fn defaults(&self) -> ResolvedParameterSet {
        self.resolve(&RawParameters::new())
    }

    /// Parameters grouped by category, groups in first-appearance order
    pub fn grouped(&self) -> Vec<(&str, Vec<&ParameterSpec>)> {
        let mut groups: Vec<(&str, Vec<&ParameterSpec>)> = Vec::new();
        for spec in &self.parameters {
            match groups.iter_mut().find(|(name, _)| *name == spec.category) {
                Some((_, members)) => members.push(spec),
                None => groups.push((spec.category.as_str(), vec![spec])),
            }
        }
        groups
    }

    /// Dependency rules naming keys this effect does not have.
    /// They are legal but the dependent parameter can never be active.
    pub fn dangling_dependencies(&self) -> Vec<(&str, &str)> {
        self.parameters
            .iter()
            .filter_map(|spec| {
                let rule = spec.dependency.as_ref()?;
                (self.parameter(&rule.on).is_none()).then_some((spec.key.as_str(), rule.on.as_str()))
            })
            .collect()
    }

    /// Check identity fields and every parameter spec
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(format!("invalid effect id '{}'", self.id));
        }
        if self.name.trim().is_empty() {
            return Err(format!("effect '{}' has no name", self.id));
        }
        if self.version.trim().is_empty() {
            return Err(format!("effect '{}' has no version", self.id));
        }

        let mut seen = HashSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.key.as_str()) {
                return Err(format!("duplicate parameter '{}'", spec.key));
            }
            spec.check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Condition, ParamValue};

    fn descriptor() -> EffectDescriptor {
        EffectDescriptor::new("edge_detection", "Edge Detection", "Artistic", "1.0.0")
            .with_parameter(ParameterSpec::choice("algorithm", "Sobel", &["Sobel", "Laplacian"]).in_category("Detection"))
            .with_parameter(ParameterSpec::boolean("blur_preprocessing", true).in_category("Detection"))
            .with_parameter(ParameterSpec::color("edge_color", [255, 255, 255]).in_category("Style"))
            .with_parameter(
                ParameterSpec::integer("blur_radius", 1, 1, 5)
                    .in_category("Detection")
                    .depends_on("blur_preprocessing", Condition::IsTrue),
            )
    }

    #[test]
    fn test_grouping_keeps_first_appearance_order() {
        let d = descriptor();
        let groups = d.grouped();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Detection");
        assert_eq!(groups[0].1.len(), 3);
        assert_eq!(groups[1].0, "Style");
    }

    #[test]
    fn test_active_keys_follow_dependency() {
        let d = descriptor();
        let mut raw = RawParameters::new();
        raw.insert("blur_preprocessing".into(), ParamValue::Bool(false));

        let params = d.resolve(&raw);
        let active = d.active_keys(&params);
        assert!(!active.contains("blur_radius"));
        assert!(d.active_keys(&d.defaults()).contains("blur_radius"));
    }

    #[test]
    fn test_check_rejects_duplicates_and_bad_ids() {
        let dup = descriptor().with_parameter(ParameterSpec::boolean("blur_preprocessing", false));
        assert!(dup.check().is_err());

        let mut bad_id = descriptor();
        bad_id.id = "edge detection".to_string();
        assert!(bad_id.check().is_err());

        assert!(descriptor().check().is_ok());
    }

    #[test]
    fn test_dangling_dependencies_are_reported() {
        let d = descriptor().with_parameter(
            ParameterSpec::real("glow", 0.5, 0.0, 1.0).depends_on("missing", Condition::IsTrue),
        );
        assert_eq!(d.dangling_dependencies(), vec![("glow", "missing")]);
    }
}
