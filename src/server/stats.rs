use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Request counters for the prediction endpoint.
///
/// Updated with relaxed atomics so the predict path never takes a lock.
#[derive(Debug)]
pub struct ServingStats {
    pub predictions: AtomicUsize,
    pub validation_errors: AtomicUsize,
    pub unavailable_errors: AtomicUsize,
    /// Latest prediction latency in microseconds
    pub latest_latency_us: AtomicU64,
    started: Instant,
}

/// Point-in-time copy of [`ServingStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub predictions: usize,
    pub validation_errors: usize,
    pub unavailable_errors: usize,
    pub latest_latency_us: u64,
    pub uptime_secs: u64,
}

impl ServingStats {
    pub fn new() -> Self {
        Self {
            predictions: AtomicUsize::new(0),
            validation_errors: AtomicUsize::new(0),
            unavailable_errors: AtomicUsize::new(0),
            latest_latency_us: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_prediction(&self, started: Instant) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        let elapsed = started.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;
        self.latest_latency_us.store(elapsed, Ordering::Relaxed);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            predictions: self.predictions.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            unavailable_errors: self.unavailable_errors.load(Ordering::Relaxed),
            latest_latency_us: self.latest_latency_us.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

impl Default for ServingStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ServingStats::new();
        assert_eq!(stats.snapshot().predictions, 0);

        stats.record_prediction(Instant::now());
        stats.record_prediction(Instant::now());
        stats.record_validation_error();
        stats.record_unavailable();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.validation_errors, 1);
        assert_eq!(snapshot.unavailable_errors, 1);
    }
}
