//! modelserve Telemetry
//!
//! Metrics for the prediction pipeline.
//!
//! Provides:
//! - The `MetricsEvent` shape emitted at each phase boundary
//! - The `MetricsSink` trait and a set of sinks (in-memory, `metrics` facade, channel)
//! - Prometheus exporter installation

pub mod collector;
pub mod event;
pub mod recorder;
pub mod sink;

pub use event::{MetricsEvent, Outcome, Phase};
pub use collector::{MetricsCollector, MetricsSnapshot};
pub use recorder::{describe_metrics, install_prometheus_recorder, RecorderSink};
pub use sink::{channel, ChannelSink, FanoutSink, MetricsSink, NoopSink};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::{MetricsEvent, Outcome, Phase};
    pub use crate::collector::MetricsCollector;
    pub use crate::sink::MetricsSink;
}
