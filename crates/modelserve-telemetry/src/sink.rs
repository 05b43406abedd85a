//! Metrics sinks
//!
//! A sink is a passive observer: `record` never blocks and never fails the
//! caller. Sinks whose backend can fail swallow the failure and report it on
//! their own diagnostic channel.

use crate::event::MetricsEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Receives metrics events from the pipeline
pub trait MetricsSink: Send + Sync {
    /// Record an event. Must return promptly and must not panic.
    fn record(&self, event: &MetricsEvent);
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn record(&self, event: &MetricsEvent) {
        (**self).record(event)
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _event: &MetricsEvent) {}
}

/// Records every event to several sinks, in order
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutSink {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if no sinks are attached
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MetricsSink for FanoutSink {
    fn record(&self, event: &MetricsEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// Forwards events to a bounded channel for a background consumer.
///
/// A full or closed channel drops the event and bumps `dropped()`.
pub struct ChannelSink {
    sender: mpsc::Sender<MetricsEvent>,
    dropped: AtomicU64,
}

/// Create a channel sink and the receiving end
pub fn channel(capacity: usize) -> (ChannelSink, mpsc::Receiver<MetricsEvent>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        ChannelSink {
            sender,
            dropped: AtomicU64::new(0),
        },
        receiver,
    )
}

impl ChannelSink {
    /// Events dropped because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MetricsSink for ChannelSink {
    fn record(&self, event: &MetricsEvent) {
        let reason = match self.sender.try_send(event.clone()) {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => "channel full",
            Err(TrySendError::Closed(_)) => "channel closed",
        };

        let previous = self.dropped.fetch_add(1, Ordering::Relaxed);
        if previous == 0 {
            warn!("Dropping metrics event for phase '{}': {}", event.phase, reason);
        } else {
            debug!("Dropped {} metrics events ({})", previous + 1, reason);
        }
    }
}
