use std::collections::BTreeMap;
use std::sync::Arc;

use crate::effects::{BlurEffect, BrightnessContrastEffect, Effect, EdgeDetectionEffect, VhsEffect};

type EffectFactory = Arc<dyn Fn() -> Arc<dyn Effect> + Send + Sync>;

/// Named effect implementations that manifests can bind to
///
/// The catalog is where compiled effect code lives; manifests on disk only
/// choose an implementation and give it an identity.
#[derive(Clone, Default)]
pub struct EffectCatalog {
    factories: BTreeMap<String, EffectFactory>,
}

impl EffectCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with all built-in effects
    pub fn builtin() -> Self {
        let mut catalog = Self::new();

        catalog.register("brightness_contrast", || Arc::new(BrightnessContrastEffect::new()));
        catalog.register("blur", || Arc::new(BlurEffect::new()));
        catalog.register("edge_detection", || Arc::new(EdgeDetectionEffect::new()));
        catalog.register("vhs", || Arc::new(VhsEffect::new()));

        catalog
    }

    /// Register an implementation
    ///
    /// # Arguments
    ///
    /// * `name` - Name manifests use in their `implementation` field
    /// * `factory` - Function that creates new instances of the effect
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Effect> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Instantiate an implementation by name
    pub fn create(&self, name: &str) -> Option<Arc<dyn Effect>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Implementation names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for EffectCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectCatalog")
            .field("implementations", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = EffectCatalog::builtin();

        assert_eq!(catalog.names(), vec!["blur", "brightness_contrast", "edge_detection", "vhs"]);
        let vhs = catalog.create("vhs").unwrap();
        assert_eq!(vhs.describe().id, "vhs");
        assert!(catalog.create("unknown").is_none());
    }
}
