use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    effects::{Effect, EffectCatalog, EffectDescriptor},
    error::{ApplyError, DiscoveryError},
    params::{RawParameters, ResolvedParameterSet},
    video::FrameBuffer,
};

/// File name that marks a directory as a single effect unit
pub const MANIFEST_FILE: &str = "effect.toml";

#[derive(Debug, Deserialize)]
struct ManifestFile {
    effect: Option<EffectSection>,

    #[serde(default)]
    defaults: RawParameters,
}

#[derive(Debug, Deserialize)]
struct EffectSection {
    id: Option<String>,
    name: Option<String>,
    category: Option<String>,
    version: Option<String>,
    description: Option<String>,
    implementation: Option<String>,
}

/// An effect declared on disk
///
/// A manifest gives a catalog implementation its own identity and may shift
/// parameter defaults:
///
/// ```toml
/// [effect]
/// id = "soft_focus"
/// name = "Soft Focus"
/// category = "Filters"
/// version = "1.2.0"
/// implementation = "blur"
///
/// [defaults]
/// radius = 3
/// ```
pub struct ManifestEffect {
    descriptor: EffectDescriptor,
    implementation: String,
    inner: Arc<dyn Effect>,
}

impl ManifestEffect {
    /// Load a manifest file and bind it against the catalog
    pub fn load(path: &Path, catalog: &EffectCatalog) -> Result<Self, DiscoveryError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| DiscoveryError::Unreadable {
            origin: origin.clone(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, &origin, catalog)
    }

    /// Parse manifest text. `origin` is only used for error reporting.
    pub fn parse(text: &str, origin: &str, catalog: &EffectCatalog) -> Result<Self, DiscoveryError> {
        let file: ManifestFile = toml::from_str(text).map_err(|e| DiscoveryError::Unreadable {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

        let missing = |reason: &str| DiscoveryError::MissingDescribe {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };

        let section = file.effect.ok_or_else(|| missing("no [effect] table"))?;
        let id = section.id.ok_or_else(|| missing("missing field 'id'"))?;
        let name = section.name.ok_or_else(|| missing("missing field 'name'"))?;
        let category = section.category.ok_or_else(|| missing("missing field 'category'"))?;
        let version = section.version.ok_or_else(|| missing("missing field 'version'"))?;

        let implementation = section.implementation.ok_or_else(|| DiscoveryError::MissingApply {
            origin: origin.to_string(),
        })?;
        let inner = catalog
            .create(&implementation)
            .ok_or_else(|| DiscoveryError::UnknownImplementation {
                origin: origin.to_string(),
                implementation: implementation.clone(),
            })?;

        let base = inner.describe();
        let mut descriptor = EffectDescriptor {
            id,
            name,
            category,
            version,
            description: section.description.unwrap_or(base.description),
            parameters: base.parameters,
        };

        for (key, value) in file.defaults {
            let invalid = |reason: String| DiscoveryError::InvalidDescriptor {
                origin: origin.to_string(),
                reason,
            };
            let spec = descriptor
                .parameter_mut(&key)
                .ok_or_else(|| invalid(format!("default given for unknown parameter '{key}'")))?;

            spec.default = value.clone();
            spec.check().map_err(invalid)?;
            if let Ok(canonical) = spec.validate(&value) {
                spec.default = canonical;
            }
        }

        Ok(Self {
            descriptor,
            implementation,
            inner,
        })
    }

    /// Catalog name this manifest is bound to
    pub fn implementation(&self) -> &str {
        &self.implementation
    }
}

impl Effect for ManifestEffect {
    fn describe(&self) -> EffectDescriptor {
        self.descriptor.clone()
    }

    fn apply(
        &self,
        input: &FrameBuffer,
        params: &ResolvedParameterSet,
        output: &mut FrameBuffer,
    ) -> Result<(), ApplyError> {
        self.inner.apply(input, params, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    const SOFT_FOCUS: &str = r#"
[effect]
id = "soft_focus"
name = "Soft Focus"
category = "Filters"
version = "1.2.0"
implementation = "blur"

[defaults]
radius = 3
"#;

    #[test]
    fn test_manifest_rebinds_identity_and_defaults() {
        let catalog = EffectCatalog::builtin();
        let effect = ManifestEffect::parse(SOFT_FOCUS, "soft_focus.toml", &catalog).unwrap();
        let descriptor = effect.describe();

        assert_eq!(descriptor.id, "soft_focus");
        assert_eq!(descriptor.version, "1.2.0");
        assert_eq!(effect.implementation(), "blur");
        assert_eq!(descriptor.parameter("radius").unwrap().default, ParamValue::Integer(3));
        assert!(descriptor.check().is_ok());
    }

    #[test]
    fn test_missing_effect_table() {
        let catalog = EffectCatalog::builtin();
        let err = ManifestEffect::parse("[defaults]\nradius = 3\n", "x.toml", &catalog).err().unwrap();
        assert!(matches!(err, DiscoveryError::MissingDescribe { .. }));
    }

    #[test]
    fn test_missing_implementation() {
        let catalog = EffectCatalog::builtin();
        let text = "[effect]\nid = \"a\"\nname = \"A\"\ncategory = \"Filters\"\nversion = \"1.0\"\n";
        let err = ManifestEffect::parse(text, "a.toml", &catalog).err().unwrap();
        assert_eq!(err, DiscoveryError::MissingApply { origin: "a.toml".to_string() });
    }

    #[test]
    fn test_unknown_implementation() {
        let catalog = EffectCatalog::builtin();
        let text = SOFT_FOCUS.replace("\"blur\"", "\"sharpen\"");
        let err = ManifestEffect::parse(&text, "b.toml", &catalog).err().unwrap();
        assert!(matches!(err, DiscoveryError::UnknownImplementation { ref implementation, .. } if implementation == "sharpen"));
    }

    #[test]
    fn test_out_of_range_default_is_rejected() {
        let catalog = EffectCatalog::builtin();
        let text = SOFT_FOCUS.replace("radius = 3", "radius = 500");
        let err = ManifestEffect::parse(&text, "c.toml", &catalog).err().unwrap();
        assert!(matches!(err, DiscoveryError::InvalidDescriptor { .. }));

        let text = SOFT_FOCUS.replace("radius = 3", "sharpness = 3");
        let err = ManifestEffect::parse(&text, "d.toml", &catalog).err().unwrap();
        assert!(matches!(err, DiscoveryError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_malformed_toml_is_unreadable() {
        let catalog = EffectCatalog::builtin();
        let err = ManifestEffect::parse("[effect\nid=", "e.toml", &catalog).err().unwrap();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));
    }
}
