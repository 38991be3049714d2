use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Elapsed processing time for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    pub elapsed_ms: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Fixed-length rolling window of samples; the oldest is dropped on insert
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<PerformanceSample>,
    capacity: usize,
    sum: f64,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Append a sample, returning the one that fell out of the window
    pub fn push(&mut self, elapsed_ms: f64) -> Option<PerformanceSample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            self.sum -= old.elapsed_ms;
        }

        self.samples.push_back(PerformanceSample {
            elapsed_ms,
            recorded_at: Utc::now(),
        });
        self.sum += elapsed_ms;
        evicted
    }

    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.samples.iter().map(|s| s.elapsed_ms).fold(0.0, f64::max)
    }

    pub fn latest(&self) -> Option<&PerformanceSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
