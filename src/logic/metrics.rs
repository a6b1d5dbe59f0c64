//! Metrics Aggregator - process-lifetime counters
//!
//! Reset only by restarting the process; nothing is persisted.

use parking_lot::Mutex;
use serde::Serialize;

use super::model::Label;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub label_attack: u64,
    pub label_benign: u64,
    /// Cumulative scoring latency
    pub latency_ms_sum: f64,
}

impl MetricsSnapshot {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.requests > 0 {
            self.latency_ms_sum / self.requests as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    counters: Mutex<MetricsSnapshot>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed scoring request
    pub fn increment(&self, label: Label, latency_ms: f64) {
        let mut counters = self.counters.lock();
        counters.requests += 1;
        match label {
            Label::Attack => counters.label_attack += 1,
            Label::Benign => counters.label_benign += 1,
        }
        counters.latency_ms_sum += latency_ms;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.counters.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_zero() {
        let metrics = MetricsAggregator::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(metrics.snapshot().avg_latency_ms(), 0.0);
    }

    #[test]
    fn test_increment_by_label() {
        let metrics = MetricsAggregator::new();
        metrics.increment(Label::Attack, 2.0);
        metrics.increment(Label::Benign, 4.0);
        metrics.increment(Label::Benign, 6.0);

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 3);
        assert_eq!(snap.label_attack, 1);
        assert_eq!(snap.label_benign, 2);
        assert_eq!(snap.avg_latency_ms(), 4.0);
    }

    #[test]
    fn test_no_lost_increments_across_threads() {
        let metrics = Arc::new(MetricsAggregator::new());

        let handles: Vec<_> = (0..10)
            .map(|t| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        let label = if (t + i) % 3 == 0 { Label::Attack } else { Label::Benign };
                        metrics.increment(label, 0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.requests, 10_000);
        assert_eq!(snap.label_attack + snap.label_benign, 10_000);
    }
}
