//! Export through the `metrics` facade
//!
//! `RecorderSink` turns events into named counters and histograms on
//! whatever recorder is installed. `install_prometheus_recorder` installs the
//! Prometheus exporter for services that want one.

use crate::event::{MetricsEvent, Phase};
use crate::sink::MetricsSink;
use metrics::{counter, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Forwards events to the global `metrics` recorder, labelled by model
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

impl RecorderSink {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsSink for RecorderSink {
    fn record(&self, event: &MetricsEvent) {
        let model = event.model.clone();
        let micros = event.duration.as_micros() as f64;

        match event.phase {
            Phase::Extraction => {
                counter!("extraction.attempted", "model" => model.clone())
                    .increment(event.attempted as u64);
                counter!("extraction.succeeded", "model" => model.clone())
                    .increment(event.succeeded as u64);
                counter!("extraction.failed", "model" => model.clone())
                    .increment(event.failed() as u64);
                histogram!("extraction.duration", "model" => model).record(micros);
            }
            Phase::Inference => {
                counter!("inference.count", "model" => model.clone())
                    .increment(event.attempted as u64);
                histogram!("inference.duration", "model" => model).record(micros);
            }
            Phase::Predict => {
                counter!(
                    "predict.outcome",
                    "model" => model.clone(),
                    "outcome" => event.outcome.label()
                )
                .increment(1);
                histogram!("predict.duration", "model" => model).record(micros);
            }
            Phase::Load => {
                counter!(
                    "load.outcome",
                    "model" => model.clone(),
                    "outcome" => event.outcome.label()
                )
                .increment(1);
                histogram!("load.duration", "model" => model).record(micros);
            }
        }
    }
}

/// Register descriptions for every metric `RecorderSink` emits
pub fn describe_metrics() {
    metrics::describe_counter!("extraction.attempted", "Inputs submitted to feature extraction");
    metrics::describe_counter!("extraction.succeeded", "Inputs that produced a feature vector");
    metrics::describe_counter!("extraction.failed", "Inputs dropped by feature extraction");
    metrics::describe_histogram!(
        "extraction.duration",
        Unit::Microseconds,
        "Feature extraction latency per batch in microseconds"
    );
    metrics::describe_counter!("inference.count", "Feature vectors submitted to inference");
    metrics::describe_histogram!(
        "inference.duration",
        Unit::Microseconds,
        "Inference latency per batch in microseconds"
    );
    metrics::describe_counter!("predict.outcome", "Predict calls by outcome");
    metrics::describe_histogram!(
        "predict.duration",
        Unit::Microseconds,
        "End-to-end predict latency in microseconds"
    );
    metrics::describe_counter!("load.outcome", "Model loads by outcome");
    metrics::describe_histogram!(
        "load.duration",
        Unit::Microseconds,
        "Model load latency in microseconds"
    );
}

/// Install the Prometheus exporter as the global recorder and return the
/// handle used to render the scrape output
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    info!("Prometheus metrics recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Outcome;
    use std::time::Duration;

    #[test]
    fn test_recorder_renders_prometheus_names() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let sink = RecorderSink::new();
            sink.record(&MetricsEvent::extraction("iris", 3, 2, Duration::from_micros(12)));
            sink.record(&MetricsEvent::predict(
                "iris",
                3,
                2,
                Duration::from_micros(40),
                Outcome::Success,
            ));
        });

        let rendered = handle.render();
        assert!(rendered.contains("extraction_attempted{model=\"iris\"} 3"));
        assert!(rendered.contains("extraction_succeeded{model=\"iris\"} 2"));
        assert!(rendered.contains("extraction_failed{model=\"iris\"} 1"));
        assert!(rendered.contains("predict_outcome"));
    }
}
