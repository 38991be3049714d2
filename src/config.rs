use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    performance::QualityTier,
};

/// Main configuration for the framekit engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Effect discovery settings
    pub registry: RegistryConfig,

    /// Frame processor settings
    pub processor: ProcessorConfig,

    /// Adaptive quality settings
    pub performance: PerformanceConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.processor.validate()?;
        self.performance.validate()?;
        Ok(())
    }
}

/// Where effects come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directories scanned for effect manifests
    pub locations: Vec<PathBuf>,

    /// Register the compiled-in effect catalog before scanning
    pub include_builtins: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            include_builtins: true,
        }
    }
}

/// How the processor runs an effect's transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Run on the calling thread; no timeout enforcement
    Inline,
    /// Run on the effect's worker and wait up to the hard timeout
    Blocking,
    /// Hand the frame to the effect's worker and return the newest finished result
    LatestWins,
}

/// Frame processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum number of cached output frames (0 disables caching)
    pub cache_capacity: usize,

    /// Sample points used for the frame fingerprint
    pub fingerprint_samples: usize,

    /// Execution model for effect transforms
    pub dispatch: DispatchMode,

    /// Hard timeout for a single transform, in multiples of the frame budget
    pub timeout_budgets: f64,

    /// Consecutive faults before an effect is flagged unhealthy
    pub unhealthy_after: u32,

    /// Upper bound on effect worker threads
    pub max_workers: usize,

    /// Number of fault records kept for diagnostics
    pub fault_log_len: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            fingerprint_samples: 1024,
            dispatch: DispatchMode::Blocking,
            timeout_budgets: 10.0,
            unhealthy_after: 3,
            max_workers: num_cpus::get().clamp(1, 8),
            fault_log_len: 32,
        }
    }
}

impl ProcessorConfig {
    fn validate(&self) -> Result<()> {
        if self.fingerprint_samples == 0 {
            return Err(invalid("processor.fingerprint_samples", self.fingerprint_samples));
        }

        if !(self.timeout_budgets >= 1.0 && self.timeout_budgets.is_finite()) {
            return Err(invalid("processor.timeout_budgets", self.timeout_budgets));
        }

        if self.unhealthy_after == 0 {
            return Err(invalid("processor.unhealthy_after", self.unhealthy_after));
        }

        if self.max_workers == 0 {
            return Err(invalid("processor.max_workers", self.max_workers));
        }

        Ok(())
    }
}

/// Adaptive quality configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Desired output frame rate; the frame budget is derived from it
    pub target_fps: f64,

    /// Number of samples in the moving average
    pub window: usize,

    /// Consecutive over-budget evaluations before stepping down (K)
    pub degrade_after: u32,

    /// Consecutive under-budget evaluations before stepping up (M)
    pub recover_after: u32,

    /// Average above `degrade_ratio * budget` counts as over budget
    pub degrade_ratio: f64,

    /// Average below `recover_ratio * budget` counts as under budget
    pub recover_ratio: f64,

    /// Tier at startup
    pub initial_tier: QualityTier,

    /// Allow the optimizer to change tiers at all
    pub adaptive: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            window: 10,
            degrade_after: 5,
            recover_after: 30,
            degrade_ratio: 1.2,
            recover_ratio: 0.7,
            initial_tier: QualityTier::High,
            adaptive: true,
        }
    }
}

impl PerformanceConfig {
    /// Per-frame budget in milliseconds
    pub fn budget_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }

    fn validate(&self) -> Result<()> {
        if !(self.target_fps > 0.0 && self.target_fps.is_finite()) {
            return Err(invalid("performance.target_fps", self.target_fps));
        }

        if self.window == 0 {
            return Err(invalid("performance.window", self.window));
        }

        if self.degrade_after == 0 || self.recover_after == 0 {
            return Err(ConfigError::InvalidValue {
                key: "performance.streaks".to_string(),
                value: format!("{}/{}", self.degrade_after, self.recover_after),
            }
            .into());
        }

        if !(self.recover_ratio > 0.0 && self.recover_ratio < self.degrade_ratio) {
            return Err(ConfigError::InvalidValue {
                key: "performance.ratio_range".to_string(),
                value: format!("{}-{}", self.recover_ratio, self.degrade_ratio),
            }
            .into());
        }

        Ok(())
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> crate::error::EngineError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}
