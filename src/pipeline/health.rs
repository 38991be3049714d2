use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::ApplyError;

/// One failed `apply`, kept for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    pub effect_id: String,
    pub sequence: u64,
    pub error: ApplyError,
    pub at: DateTime<Utc>,
}

/// Tracks consecutive faults per effect and raises the unhealthy flag
///
/// The flag is informational: processing continues with pass-through frames
/// and the next successful `apply` clears it.
#[derive(Debug)]
pub struct HealthMonitor {
    threshold: u32,
    consecutive: HashMap<String, u32>,
    log: VecDeque<FaultRecord>,
    log_len: usize,
}

impl HealthMonitor {
    pub fn new(threshold: u32, log_len: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: HashMap::new(),
            log: VecDeque::with_capacity(log_len),
            log_len,
        }
    }

    /// Record a fault. Returns true if the effect is now unhealthy.
    pub fn record_fault(&mut self, effect_id: &str, sequence: u64, error: ApplyError) -> bool {
        warn!(effect = effect_id, sequence, "Effect fault, passing frame through: {}", error);

        let count = self.consecutive.entry(effect_id.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if count == self.threshold {
            error!(effect = effect_id, faults = count, "Effect marked unhealthy");
        }

        if self.log_len > 0 {
            if self.log.len() == self.log_len {
                self.log.pop_front();
            }
            self.log.push_back(FaultRecord {
                effect_id: effect_id.to_string(),
                sequence,
                error,
                at: Utc::now(),
            });
        }

        count >= self.threshold
    }

    /// Record a success, clearing the fault streak
    pub fn record_success(&mut self, effect_id: &str) {
        if let Some(count) = self.consecutive.remove(effect_id) {
            if count >= self.threshold {
                info!(effect = effect_id, "Effect recovered");
            }
        }
    }

    pub fn is_unhealthy(&self, effect_id: &str) -> bool {
        self.consecutive_faults(effect_id) >= self.threshold
    }

    pub fn consecutive_faults(&self, effect_id: &str) -> u32 {
        self.consecutive.get(effect_id).copied().unwrap_or(0)
    }

    /// Most recent faults, oldest first
    pub fn faults(&self) -> impl Iterator<Item = &FaultRecord> {
        self.log.iter()
    }

    pub fn last_fault(&self) -> Option<&FaultRecord> {
        self.log.back()
    }

    /// Forget streaks for an effect that is no longer selected
    pub fn forget(&mut self, effect_id: &str) {
        self.consecutive.remove(effect_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_after_threshold_and_reset() {
        let mut health = HealthMonitor::new(3, 8);
        let err = || ApplyError::failed("vhs", "boom");

        assert!(!health.record_fault("vhs", 1, err()));
        assert!(!health.record_fault("vhs", 2, err()));
        assert!(health.record_fault("vhs", 3, err()));
        assert!(health.is_unhealthy("vhs"));
        assert!(!health.is_unhealthy("blur"));

        health.record_success("vhs");
        assert!(!health.is_unhealthy("vhs"));
        assert_eq!(health.consecutive_faults("vhs"), 0);
    }

    #[test]
    fn test_fault_log_is_bounded() {
        let mut health = HealthMonitor::new(3, 2);
        for seq in 0..5 {
            health.record_fault("blur", seq, ApplyError::failed("blur", "x"));
        }

        let sequences: Vec<u64> = health.faults().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![3, 4]);
        assert_eq!(health.last_fault().unwrap().sequence, 4);
    }
}
