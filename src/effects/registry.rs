use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::RegistryConfig,
    effects::{manifest::MANIFEST_FILE, Effect, EffectCatalog, EffectDescriptor, ManifestEffect},
    error::{DiscoveryError, RegistryError},
};

/// Deepest directory nesting scanned below a plugin location
const MAX_SCAN_DEPTH: usize = 4;

/// Origin prefix of effects registered straight from the catalog
const BUILTIN_ORIGIN: &str = "builtin";

/// A successfully registered effect
#[derive(Clone)]
pub struct RegisteredEffect {
    pub descriptor: Arc<EffectDescriptor>,
    pub effect: Arc<dyn Effect>,
    /// Where the effect came from: `builtin:<name>` or a manifest path
    pub origin: String,
}

impl RegisteredEffect {
    pub fn is_builtin(&self) -> bool {
        self.origin.starts_with(BUILTIN_ORIGIN)
    }
}

/// Outcome of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct RegistrationReport {
    /// Ids registered during this pass, in registration order
    pub registered: Vec<String>,

    /// Candidates and locations that were skipped
    pub rejected: Vec<DiscoveryError>,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    fn merge(&mut self, other: RegistrationReport) {
        self.registered.extend(other.registered);
        self.rejected.extend(other.rejected);
    }
}

/// Registry counters for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub effects: usize,
    pub builtin: usize,
    pub discovered: usize,
    pub categories: usize,
    pub parameters: usize,
}

/// Catalog of every effect available to the engine
///
/// The registry is built once by [`init`](EffectRegistry::init) and is
/// read-only afterwards, so it is shared as `Arc<EffectRegistry>`. Bad
/// candidates never abort a load; they are reported in the
/// [`RegistrationReport`] and skipped. The only fatal outcome is an engine
/// with no way to obtain any effect at all.
pub struct EffectRegistry {
    config: RegistryConfig,
    catalog: EffectCatalog,
    entries: Vec<RegisteredEffect>,
    index: HashMap<String, usize>,
    torn_down: bool,
}

impl EffectRegistry {
    /// Create an empty registry without loading anything
    pub fn new(config: RegistryConfig, catalog: EffectCatalog) -> Self {
        Self {
            config,
            catalog,
            entries: Vec::new(),
            index: HashMap::new(),
            torn_down: false,
        }
    }

    /// Build a registry from configuration: built-ins first, then every
    /// configured plugin location.
    pub fn init(config: RegistryConfig, catalog: EffectCatalog) -> Result<(Self, RegistrationReport), RegistryError> {
        let mut registry = Self::new(config, catalog);
        let report = registry.load()?;
        Ok((registry, report))
    }

    /// Discard everything and load again from configuration
    pub fn reload(&mut self) -> Result<RegistrationReport, RegistryError> {
        if self.torn_down {
            return Err(RegistryError::TornDown);
        }
        info!("Reloading effect registry");
        self.load()
    }

    /// Release every effect. The registry refuses further loads.
    pub fn teardown(&mut self) {
        info!("Tearing down effect registry ({} effects)", self.entries.len());
        self.entries.clear();
        self.index.clear();
        self.torn_down = true;
    }

    fn load(&mut self) -> Result<RegistrationReport, RegistryError> {
        self.entries.clear();
        self.index.clear();

        if self.config.locations.is_empty() && !self.config.include_builtins {
            return Err(RegistryError::NoLocations);
        }

        let mut report = RegistrationReport::default();
        if self.config.include_builtins {
            report.merge(self.register_builtins());
        }

        if !self.config.locations.is_empty() {
            let locations = self.config.locations.clone();
            report.merge(self.discover(&locations)?);
        }

        info!(
            "Effect registry ready: {} effects, {} rejected",
            self.entries.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    fn register_builtins(&mut self) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        let names: Vec<String> = self.catalog.names().into_iter().map(str::to_string).collect();

        for name in names {
            let Some(effect) = self.catalog.create(&name) else {
                continue;
            };
            match self.register(effect, &format!("{BUILTIN_ORIGIN}:{name}")) {
                Ok(descriptor) => report.registered.push(descriptor.id.clone()),
                Err(e) => {
                    warn!("Rejected built-in effect: {}", e);
                    report.rejected.push(e);
                }
            }
        }
        report
    }

    /// Scan plugin locations and register every valid candidate found
    ///
    /// A candidate is a `*.toml` manifest file or a directory holding an
    /// `effect.toml`. Other directories are searched recursively. Fails only
    /// if nothing could be scanned and the registry holds no effects yet.
    pub fn discover(&mut self, locations: &[PathBuf]) -> Result<RegistrationReport, RegistryError> {
        if self.torn_down {
            return Err(RegistryError::TornDown);
        }
        if locations.is_empty() && self.entries.is_empty() {
            return Err(RegistryError::NoLocations);
        }

        let mut report = RegistrationReport::default();
        let mut resolved = 0;

        for location in locations {
            if !location.is_dir() {
                warn!("Plugin location unavailable: {}", location.display());
                report.rejected.push(DiscoveryError::LocationUnavailable {
                    path: location.display().to_string(),
                });
                continue;
            }
            resolved += 1;

            let mut candidates = Vec::new();
            if let Err(e) = collect_candidates(location, 0, &mut candidates) {
                warn!("Failed to scan {}: {}", location.display(), e);
                report.rejected.push(DiscoveryError::Unreadable {
                    origin: location.display().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
            debug!("Found {} candidates in {}", candidates.len(), location.display());

            for candidate in candidates {
                let origin = candidate.display().to_string();
                let outcome = ManifestEffect::load(&candidate, &self.catalog)
                    .and_then(|effect| self.register(Arc::new(effect), &origin));

                match outcome {
                    Ok(descriptor) => report.registered.push(descriptor.id.clone()),
                    Err(e) => {
                        warn!("Skipping effect candidate: {}", e);
                        report.rejected.push(e);
                    }
                }
            }
        }

        if resolved == 0 && self.entries.is_empty() {
            let paths = locations
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RegistryError::Unresolvable { paths });
        }

        Ok(report)
    }

    /// Register a single effect. The descriptor is captured and checked once.
    ///
    /// The first registration of an id wins; later ones are rejected as
    /// conflicts.
    pub fn register(&mut self, effect: Arc<dyn Effect>, origin: &str) -> Result<Arc<EffectDescriptor>, DiscoveryError> {
        let descriptor = effect.describe();
        descriptor.check().map_err(|reason| DiscoveryError::InvalidDescriptor {
            origin: origin.to_string(),
            reason,
        })?;

        if let Some(&existing) = self.index.get(&descriptor.id) {
            return Err(DiscoveryError::Conflict {
                origin: origin.to_string(),
                id: descriptor.id,
                existing: self.entries[existing].origin.clone(),
            });
        }

        for (key, on) in descriptor.dangling_dependencies() {
            warn!(
                "Effect '{}': parameter '{}' depends on unknown key '{}' and will never be active",
                descriptor.id, key, on
            );
        }

        let descriptor = Arc::new(descriptor);
        debug!("Registered effect '{}' from {}", descriptor.id, origin);
        self.index.insert(descriptor.id.clone(), self.entries.len());
        self.entries.push(RegisteredEffect {
            descriptor: Arc::clone(&descriptor),
            effect,
            origin: origin.to_string(),
        });
        Ok(descriptor)
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredEffect> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn lookup(&self, id: &str) -> Option<&EffectDescriptor> {
        self.get(id).map(|entry| entry.descriptor.as_ref())
    }

    pub fn effect(&self, id: &str) -> Option<Arc<dyn Effect>> {
        self.get(id).map(|entry| Arc::clone(&entry.effect))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All descriptors in registration order
    pub fn all(&self) -> Vec<&EffectDescriptor> {
        self.entries.iter().map(|e| e.descriptor.as_ref()).collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&EffectDescriptor> {
        self.entries
            .iter()
            .map(|e| e.descriptor.as_ref())
            .filter(|d| d.category == category)
            .collect()
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.category.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Case-insensitive match on id, name, category and description
    pub fn search(&self, query: &str) -> Vec<&EffectDescriptor> {
        let query = query.to_lowercase();
        self.entries
            .iter()
            .map(|e| e.descriptor.as_ref())
            .filter(|d| {
                [&d.id, &d.name, &d.category, &d.description]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let builtin = self.entries.iter().filter(|e| e.is_builtin()).count();
        RegistryStats {
            effects: self.entries.len(),
            builtin,
            discovered: self.entries.len() - builtin,
            categories: self.categories().len(),
            parameters: self.entries.iter().map(|e| e.descriptor.parameters.len()).sum(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.index.keys().collect::<Vec<_>>())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

fn collect_candidates(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| !n.starts_with('.') && !n.starts_with('_'))
        })
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            let manifest = path.join(MANIFEST_FILE);
            if manifest.is_file() {
                out.push(manifest);
            } else if depth < MAX_SCAN_DEPTH {
                collect_candidates(&path, depth + 1, out)?;
            }
        } else if path.extension().map_or(false, |ext| ext == "toml") {
            out.push(path);
        }
    }
    Ok(())
}
