use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::params::value::{ParamValue, RawParameters};

/// Saved raw parameter maps, one table per effect id
///
/// ```toml
/// [blur]
/// kind = "Box"
/// radius = 4
///
/// [edge_detection]
/// edge_color = [255, 0, 0]
/// ```
///
/// Values are stored as given; validation happens when the processor
/// resolves them against the effect's schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterStore {
    effects: BTreeMap<String, RawParameters>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from disk. A missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No parameter store at {}; starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::ParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "parameters".to_string(),
            value: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Saved parameters for an effect (empty if none)
    pub fn get(&self, effect_id: &str) -> RawParameters {
        self.effects.get(effect_id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, effect_id: &str, params: RawParameters) {
        self.effects.insert(effect_id.to_string(), params);
    }

    /// Set a single value, keeping the rest of the effect's map
    pub fn update(&mut self, effect_id: &str, key: &str, value: ParamValue) {
        self.effects
            .entry(effect_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn remove(&mut self, effect_id: &str) -> Option<RawParameters> {
        self.effects.remove(effect_id)
    }

    /// Effect ids with saved parameters
    pub fn effects(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_persists_mixed_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");

        let mut store = ParameterStore::new();
        store.update("blur", "kind", ParamValue::from("Box"));
        store.update("blur", "radius", ParamValue::Integer(4));
        store.update("vhs", "intensity", ParamValue::Float(0.5));
        store.update("edge_detection", "edge_color", ParamValue::Color([255, 0, 0]));
        store.save(&path).unwrap();

        let loaded = ParameterStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.get("blur").get("radius"), Some(&ParamValue::Integer(4)));
        assert_eq!(loaded.effects().count(), 3);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = ParameterStore::load(dir.path().join("absent.toml")).unwrap();
        assert!(store.is_empty());
        assert!(store.get("blur").is_empty());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(&path, "blur = [").unwrap();
        assert!(ParameterStore::load(&path).is_err());
    }
}
