//! In-memory metrics collection

use crate::event::{MetricsEvent, Phase};
use crate::sink::MetricsSink;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_HISTORY: usize = 1024;

/// Metrics collector for pipeline monitoring
///
/// Counters are lock-free; the most recent events are kept in a bounded
/// history for inspection.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    predict_calls: AtomicU64,
    predict_failures: AtomicU64,
    items_attempted: AtomicU64,
    items_extracted: AtomicU64,
    items_inferred: AtomicU64,
    predictions: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    extraction_latency_us: AtomicU64,
    inference_latency_us: AtomicU64,
    predict_latency_us: AtomicU64,
    load_latency_us: AtomicU64,
    history: Mutex<VecDeque<MetricsEvent>>,
    history_capacity: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    /// Create a collector that keeps the last `capacity` events
    pub fn with_history(capacity: usize) -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                predict_calls: AtomicU64::new(0),
                predict_failures: AtomicU64::new(0),
                items_attempted: AtomicU64::new(0),
                items_extracted: AtomicU64::new(0),
                items_inferred: AtomicU64::new(0),
                predictions: AtomicU64::new(0),
                loads: AtomicU64::new(0),
                load_failures: AtomicU64::new(0),
                extraction_latency_us: AtomicU64::new(0),
                inference_latency_us: AtomicU64::new(0),
                predict_latency_us: AtomicU64::new(0),
                load_latency_us: AtomicU64::new(0),
                history: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY))),
                history_capacity: capacity,
            }),
        }
    }

    /// Recent events, oldest first
    pub fn events(&self) -> Vec<MetricsEvent> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Recent events for one phase, oldest first
    pub fn events_for(&self, phase: Phase) -> Vec<MetricsEvent> {
        self.inner
            .history
            .lock()
            .iter()
            .filter(|e| e.phase == phase)
            .cloned()
            .collect()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            predict_calls: inner.predict_calls.load(Ordering::Relaxed),
            predict_failures: inner.predict_failures.load(Ordering::Relaxed),
            items_attempted: inner.items_attempted.load(Ordering::Relaxed),
            items_extracted: inner.items_extracted.load(Ordering::Relaxed),
            items_inferred: inner.items_inferred.load(Ordering::Relaxed),
            predictions: inner.predictions.load(Ordering::Relaxed),
            loads: inner.loads.load(Ordering::Relaxed),
            load_failures: inner.load_failures.load(Ordering::Relaxed),
            extraction_latency_us: inner.extraction_latency_us.load(Ordering::Relaxed),
            inference_latency_us: inner.inference_latency_us.load(Ordering::Relaxed),
            predict_latency_us: inner.predict_latency_us.load(Ordering::Relaxed),
            load_latency_us: inner.load_latency_us.load(Ordering::Relaxed),
        }
    }

    fn push_history(&self, event: &MetricsEvent) {
        if self.inner.history_capacity == 0 {
            return;
        }
        let mut history = self.inner.history.lock();
        if history.len() == self.inner.history_capacity {
            history.pop_front();
        }
        history.push_back(event.clone());
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: &MetricsEvent) {
        let inner = &self.inner;
        let micros = event.duration.as_micros() as u64;
        let attempted = event.attempted as u64;
        let succeeded = event.succeeded as u64;

        match event.phase {
            Phase::Extraction => {
                inner.items_attempted.fetch_add(attempted, Ordering::Relaxed);
                inner.items_extracted.fetch_add(succeeded, Ordering::Relaxed);
                inner.extraction_latency_us.fetch_add(micros, Ordering::Relaxed);
            }
            Phase::Inference => {
                inner.items_inferred.fetch_add(succeeded, Ordering::Relaxed);
                inner.inference_latency_us.fetch_add(micros, Ordering::Relaxed);
            }
            Phase::Predict => {
                inner.predict_calls.fetch_add(1, Ordering::Relaxed);
                if !event.outcome.is_success() {
                    inner.predict_failures.fetch_add(1, Ordering::Relaxed);
                }
                inner.predictions.fetch_add(succeeded, Ordering::Relaxed);
                inner.predict_latency_us.fetch_add(micros, Ordering::Relaxed);
            }
            Phase::Load => {
                inner.loads.fetch_add(1, Ordering::Relaxed);
                if !event.outcome.is_success() {
                    inner.load_failures.fetch_add(1, Ordering::Relaxed);
                }
                inner.load_latency_us.fetch_add(micros, Ordering::Relaxed);
            }
        }

        self.push_history(event);
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub predict_calls: u64,
    pub predict_failures: u64,
    pub items_attempted: u64,
    pub items_extracted: u64,
    pub items_inferred: u64,
    pub predictions: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub extraction_latency_us: u64,
    pub inference_latency_us: u64,
    pub predict_latency_us: u64,
    pub load_latency_us: u64,
}

impl MetricsSnapshot {
    /// Average latency per predict call
    pub fn avg_predict_latency_us(&self) -> u64 {
        if self.predict_calls == 0 {
            0
        } else {
            self.predict_latency_us / self.predict_calls
        }
    }

    /// Items that failed extraction
    pub fn extraction_failures(&self) -> u64 {
        self.items_attempted.saturating_sub(self.items_extracted)
    }

    /// Fraction of items that failed extraction
    pub fn extraction_failure_rate(&self) -> f64 {
        if self.items_attempted == 0 {
            0.0
        } else {
            self.extraction_failures() as f64 / self.items_attempted as f64
        }
    }

    /// Fraction of predict calls that failed
    pub fn failure_rate(&self) -> f64 {
        if self.predict_calls == 0 {
            0.0
        } else {
            self.predict_failures as f64 / self.predict_calls as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Outcome;
    use std::time::Duration;

    #[test]
    fn test_metrics_collection() {
        let metrics = MetricsCollector::new();

        metrics.record(&MetricsEvent::extraction("m", 4, 3, Duration::from_micros(100)));
        let inference = Duration::from_micros(200);
        metrics.record(&MetricsEvent::inference("m", 3, inference, Outcome::Success));
        let predict = Duration::from_micros(5000);
        metrics.record(&MetricsEvent::predict("m", 4, 3, predict, Outcome::Success));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predict_calls, 1);
        assert_eq!(snapshot.items_attempted, 4);
        assert_eq!(snapshot.items_extracted, 3);
        assert_eq!(snapshot.items_inferred, 3);
        assert_eq!(snapshot.predictions, 3);
        assert_eq!(snapshot.extraction_failures(), 1);
        assert_eq!(snapshot.avg_predict_latency_us(), 5000);
        assert!((snapshot.extraction_failure_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failures_counted() {
        let metrics = MetricsCollector::new();

        metrics.record(&MetricsEvent::load("m", Duration::from_millis(3), Outcome::Failure("io")));
        let unavailable = Outcome::Failure("model_unavailable");
        metrics.record(&MetricsEvent::predict("m", 2, 0, Duration::ZERO, unavailable));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.load_failures, 1);
        assert_eq!(snapshot.failure_rate(), 1.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let metrics = MetricsCollector::with_history(2);

        for attempted in 1..=3 {
            metrics.record(&MetricsEvent::extraction("m", attempted, attempted, Duration::ZERO));
        }

        let events = metrics.events_for(Phase::Extraction);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].attempted, 2);
        assert_eq!(events[1].attempted, 3);
    }
}
