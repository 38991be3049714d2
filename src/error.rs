use thiserror::Error;

/// Main error type for the framekit engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Parameter validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Effect application error: {0}")]
    Apply(#[from] ApplyError),

    #[error("Effect discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// A raw parameter value that cannot be coerced to its declared kind.
///
/// Always recovered locally by substituting the parameter default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Parameter '{key}' expects {expected}, got {got}")]
    TypeMismatch {
        key: String,
        expected: String,
        got: String,
    },

    #[error("Parameter '{key}' has an unrepresentable value: {details}")]
    Unrepresentable { key: String, details: String },
}

/// Failures raised while an effect transforms a frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Effect '{effect}' failed: {reason}")]
    Failed { effect: String, reason: String },

    #[error("Effect '{effect}' panicked: {message}")]
    Panicked { effect: String, message: String },

    #[error("Effect '{effect}' changed frame shape from {expected} to {actual}")]
    ShapeMismatch {
        effect: String,
        expected: String,
        actual: String,
    },

    #[error("Effect '{effect}' exceeded the hard timeout of {timeout_ms:.1}ms")]
    TimedOut { effect: String, timeout_ms: f64 },

    #[error("Worker for effect '{effect}' is unavailable")]
    WorkerLost { effect: String },
}

impl ApplyError {
    /// Convenience constructor used by effect implementations
    pub fn failed<E: Into<String>, R: Into<String>>(effect: E, reason: R) -> Self {
        Self::Failed {
            effect: effect.into(),
            reason: reason.into(),
        }
    }

    /// Id of the effect that raised this error
    pub fn effect(&self) -> &str {
        match self {
            Self::Failed { effect, .. }
            | Self::Panicked { effect, .. }
            | Self::ShapeMismatch { effect, .. }
            | Self::TimedOut { effect, .. }
            | Self::WorkerLost { effect } => effect,
        }
    }
}

/// A candidate effect unit rejected at registry-load time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error("Plugin location unavailable: {path}")]
    LocationUnavailable { path: String },

    #[error("Failed to read candidate {origin}: {reason}")]
    Unreadable { origin: String, reason: String },

    #[error("Candidate {origin} does not describe an effect: {reason}")]
    MissingDescribe { origin: String, reason: String },

    #[error("Candidate {origin} does not provide an apply implementation")]
    MissingApply { origin: String },

    #[error("Candidate {origin} binds unknown implementation '{implementation}'")]
    UnknownImplementation {
        origin: String,
        implementation: String,
    },

    #[error("Candidate {origin} has an invalid descriptor: {reason}")]
    InvalidDescriptor { origin: String, reason: String },

    #[error("Candidate {origin} reuses effect id '{id}' already registered by {existing}")]
    Conflict {
        origin: String,
        id: String,
        existing: String,
    },
}

impl DiscoveryError {
    /// Where the rejected candidate came from
    pub fn origin(&self) -> &str {
        match self {
            Self::LocationUnavailable { path } => path,
            Self::Unreadable { origin, .. }
            | Self::MissingDescribe { origin, .. }
            | Self::MissingApply { origin }
            | Self::UnknownImplementation { origin, .. }
            | Self::InvalidDescriptor { origin, .. }
            | Self::Conflict { origin, .. } => origin,
        }
    }
}

/// Registry construction failures. These are the only fatal engine errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("No plugin locations configured and built-in effects are disabled")]
    NoLocations,

    #[error("None of the configured plugin locations could be resolved: {paths}")]
    Unresolvable { paths: String },

    #[error("Registry has been torn down")]
    TornDown,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable without operator intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Substituted by defaults or pass-through at the call site
            Self::Validation(_) | Self::Apply(_) | Self::Discovery(_) | Self::UnknownEffect(_) => true,
            // IO errors might be temporary
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Registry(RegistryError::NoLocations) => {
                "No effect locations are configured. Add a plugin directory or enable the built-in effects.".to_string()
            }
            Self::Registry(RegistryError::Unresolvable { paths }) => {
                format!("Could not open any plugin directory ({}). Please check the paths exist.", paths)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::UnknownEffect(id) => {
                format!("No effect named '{}' is registered. Use `framekit list` to see what is available.", id)
            }
            Self::Apply(e) => {
                format!("Effect '{}' is misbehaving; frames are passed through unchanged.", e.effect())
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_error_reports_effect() {
        let err = ApplyError::failed("blur", "kernel too large");
        assert_eq!(err.effect(), "blur");
        assert!(EngineError::from(err).is_recoverable());
    }

    #[test]
    fn test_registry_errors_are_fatal() {
        let err = EngineError::from(RegistryError::NoLocations);
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("built-in effects"));
    }
}
