use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::PerformanceConfig;
use crate::effects::EffectDescriptor;
use crate::params::RawParameters;
use crate::performance::tier::{QualityTier, TierChange};
use crate::performance::window::SampleWindow;

/// Recommends a quality tier from recent frame timings
///
/// Every recorded sample re-evaluates the moving average against the frame
/// budget. Hysteresis keeps the tier from oscillating: it only steps down
/// after `degrade_after` consecutive over-budget evaluations and only steps
/// up after `recover_after` consecutive comfortably-under-budget ones. Both
/// streaks restart after every change.
#[derive(Debug, Clone)]
pub struct PerformanceOptimizer {
    config: PerformanceConfig,
    window: SampleWindow,
    tier: QualityTier,
    over_streak: u32,
    under_streak: u32,
    tier_changes: u64,
}

/// Point-in-time view of the optimizer, for status displays
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
    pub tier: QualityTier,
    pub average_ms: f64,
    pub peak_ms: f64,
    pub budget_ms: f64,
    pub samples: usize,
    pub tier_changes: u64,
}

impl PerformanceOptimizer {
    pub fn new(config: PerformanceConfig) -> Self {
        Self {
            window: SampleWindow::new(config.window),
            tier: config.initial_tier,
            config,
            over_streak: 0,
            under_streak: 0,
            tier_changes: 0,
        }
    }

    pub fn current_tier(&self) -> QualityTier {
        self.tier
    }

    pub fn budget_ms(&self) -> f64 {
        self.config.budget_ms()
    }

    pub fn moving_average(&self) -> f64 {
        self.window.average()
    }

    /// Feed one frame's processing time and apply the tier-change policy
    pub fn record(&mut self, elapsed_ms: f64) -> Option<TierChange> {
        self.window.push(elapsed_ms);
        if !self.config.adaptive {
            return None;
        }

        let average = self.window.average();
        let budget = self.budget_ms();

        if average > self.config.degrade_ratio * budget {
            self.over_streak += 1;
            self.under_streak = 0;
        } else if average < self.config.recover_ratio * budget {
            self.under_streak += 1;
            self.over_streak = 0;
        } else {
            self.over_streak = 0;
            self.under_streak = 0;
        }

        let target = if self.over_streak >= self.config.degrade_after {
            self.tier.step_down()
        } else if self.under_streak >= self.config.recover_after {
            self.tier.step_up()
        } else {
            return None;
        };

        self.over_streak = 0;
        self.under_streak = 0;

        if target == self.tier {
            debug!(tier = %self.tier, average_ms = average, "Tier already at its limit");
            return None;
        }

        let change = TierChange {
            from: self.tier,
            to: target,
            average_ms: average,
            budget_ms: budget,
            at: Utc::now(),
        };
        self.tier = target;
        self.tier_changes += 1;

        if change.is_degradation() {
            warn!(
                "Quality tier lowered {} -> {} (avg {:.1}ms, budget {:.1}ms)",
                change.from, change.to, average, budget
            );
        } else {
            info!(
                "Quality tier raised {} -> {} (avg {:.1}ms, budget {:.1}ms)",
                change.from, change.to, average, budget
            );
        }

        Some(change)
    }

    /// Parameter overrides the current tier forces for this effect.
    ///
    /// Only cost parameters (numeric specs that declare tier overrides) are
    /// ever touched. A spec without an entry for the current tier inherits
    /// the entry of the next richer tier below `High`; `High` overrides
    /// nothing.
    pub fn overrides_for(&self, descriptor: &EffectDescriptor) -> RawParameters {
        overrides_at(self.tier, descriptor)
    }

    /// Forget all samples and streaks, keeping the current tier
    pub fn reset_window(&mut self) {
        self.window.clear();
        self.over_streak = 0;
        self.under_streak = 0;
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            tier: self.tier,
            average_ms: self.window.average(),
            peak_ms: self.window.max(),
            budget_ms: self.budget_ms(),
            samples: self.window.len(),
            tier_changes: self.tier_changes,
        }
    }
}

/// Overrides a given tier forces for an effect
pub fn overrides_at(tier: QualityTier, descriptor: &EffectDescriptor) -> RawParameters {
    let mut overrides = RawParameters::new();
    if tier == QualityTier::High {
        return overrides;
    }

    for spec in descriptor.parameters.iter().filter(|s| s.is_cost_parameter()) {
        if let Some((_, value)) = spec.tier_overrides.range(tier..QualityTier::High).next() {
            overrides.insert(spec.key.clone(), value.clone());
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamValue, ParameterSpec};

    fn config(k: u32, m: u32) -> PerformanceConfig {
        PerformanceConfig {
            target_fps: 30.0,
            window: 8,
            degrade_after: k,
            recover_after: m,
            ..PerformanceConfig::default()
        }
    }

    #[test]
    fn test_single_step_down_after_k_samples() {
        let k = 4;
        let mut optimizer = PerformanceOptimizer::new(config(k, 10));
        let slow = optimizer.budget_ms() * 1.5;

        for i in 1..=k + 1 {
            let change = optimizer.record(slow);
            if i == k {
                let change = change.expect("step down on the K-th sample");
                assert_eq!(change.from, QualityTier::High);
                assert_eq!(change.to, QualityTier::Balanced);
                assert!(change.is_degradation());
            } else {
                assert!(change.is_none(), "unexpected change at sample {i}");
            }
        }
        assert_eq!(optimizer.current_tier(), QualityTier::Balanced);
        assert_eq!(optimizer.snapshot().tier_changes, 1);
    }

    #[test]
    fn test_step_up_after_m_fast_samples() {
        let mut cfg = config(2, 3);
        cfg.initial_tier = QualityTier::Low;
        let mut optimizer = PerformanceOptimizer::new(cfg);
        let fast = optimizer.budget_ms() * 0.2;

        assert!(optimizer.record(fast).is_none());
        assert!(optimizer.record(fast).is_none());
        let change = optimizer.record(fast).unwrap();
        assert_eq!(change.to, QualityTier::Balanced);
    }

    #[test]
    fn test_in_band_average_resets_streaks() {
        let mut optimizer = PerformanceOptimizer::new(PerformanceConfig {
            window: 1,
            ..config(2, 2)
        });
        let budget = optimizer.budget_ms();

        optimizer.record(budget * 1.5);
        optimizer.record(budget);
        assert!(optimizer.record(budget * 1.5).is_none());
        assert_eq!(optimizer.current_tier(), QualityTier::High);
    }

    #[test]
    fn test_low_tier_is_a_floor() {
        let mut cfg = config(1, 10);
        cfg.initial_tier = QualityTier::Low;
        let mut optimizer = PerformanceOptimizer::new(cfg);
        assert!(optimizer.record(1000.0).is_none());
        assert_eq!(optimizer.current_tier(), QualityTier::Low);
    }

    #[test]
    fn test_non_adaptive_never_changes() {
        let mut cfg = config(1, 1);
        cfg.adaptive = false;
        let mut optimizer = PerformanceOptimizer::new(cfg);
        for _ in 0..10 {
            assert!(optimizer.record(1000.0).is_none());
        }
        assert_eq!(optimizer.current_tier(), QualityTier::High);
    }

    #[test]
    fn test_overrides_only_touch_cost_parameters() {
        let descriptor = EffectDescriptor::new("blur", "Blur", "Filters", "1.0.0")
            .with_parameter(
                ParameterSpec::integer("radius", 9, 1, 15)
                    .with_tier_override(QualityTier::Low, 2)
                    .with_tier_override(QualityTier::Balanced, 5),
            )
            .with_parameter(ParameterSpec::integer("passes", 3, 1, 5).with_tier_override(QualityTier::Balanced, 2))
            .with_parameter(ParameterSpec::choice("kind", "Gaussian", &["Gaussian", "Box"]));

        assert!(overrides_at(QualityTier::High, &descriptor).is_empty());

        let balanced = overrides_at(QualityTier::Balanced, &descriptor);
        assert_eq!(balanced.get("radius"), Some(&ParamValue::Integer(5)));
        assert_eq!(balanced.get("passes"), Some(&ParamValue::Integer(2)));

        let low = overrides_at(QualityTier::Low, &descriptor);
        assert_eq!(low.get("radius"), Some(&ParamValue::Integer(2)));
        assert_eq!(low.get("passes"), Some(&ParamValue::Integer(2)));
        assert!(!low.contains_key("kind"));
    }
}
