use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete performance/quality trade-off level, ordered `Low < Balanced < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Balanced,
    High,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Balanced, QualityTier::High];

    /// One tier cheaper, clamped at `Low`
    pub fn step_down(self) -> Self {
        match self {
            QualityTier::High => QualityTier::Balanced,
            QualityTier::Balanced | QualityTier::Low => QualityTier::Low,
        }
    }

    /// One tier richer, clamped at `High`
    pub fn step_up(self) -> Self {
        match self {
            QualityTier::Low => QualityTier::Balanced,
            QualityTier::Balanced | QualityTier::High => QualityTier::High,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityTier::Low => "low",
            QualityTier::Balanced => "balanced",
            QualityTier::High => "high",
        };
        f.write_str(name)
    }
}

/// Emitted whenever the optimizer moves between tiers. Informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct TierChange {
    pub from: QualityTier,
    pub to: QualityTier,
    pub average_ms: f64,
    pub budget_ms: f64,
    pub at: DateTime<Utc>,
}

impl TierChange {
    pub fn is_degradation(&self) -> bool {
        self.to < self.from
    }
}
