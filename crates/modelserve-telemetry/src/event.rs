//! Metrics events emitted at pipeline phase boundaries

use std::fmt;
use std::time::Duration;

/// Pipeline phase an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Model load (artifact fetch, parse, settings compilation)
    Load,
    /// Feature extraction over a batch
    Extraction,
    /// Inference over the surviving vectors
    Inference,
    /// A whole `predict` call
    Predict,
}

impl Phase {
    /// Metric name prefix for this phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Extraction => "extraction",
            Self::Inference => "inference",
            Self::Predict => "predict",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    /// Failed with the given error kind
    Failure(&'static str),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Label used for the `outcome` metric dimension
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure(kind) => *kind,
        }
    }
}

/// A single metrics record
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsEvent {
    /// Model the event belongs to (its artifact locator)
    pub model: String,

    /// Phase name
    pub phase: Phase,

    /// Wall time spent in the phase
    pub duration: Duration,

    /// Items that entered the phase
    pub attempted: usize,

    /// Items that came out of the phase successfully
    pub succeeded: usize,

    /// Phase outcome
    pub outcome: Outcome,
}

impl MetricsEvent {
    /// Extraction phase: `attempted` inputs, `succeeded` vectors
    pub fn extraction(
        model: impl Into<String>,
        attempted: usize,
        succeeded: usize,
        duration: Duration,
    ) -> Self {
        Self {
            model: model.into(),
            phase: Phase::Extraction,
            duration,
            attempted,
            succeeded,
            outcome: Outcome::Success,
        }
    }

    /// Inference phase over `count` vectors
    pub fn inference(
        model: impl Into<String>,
        count: usize,
        duration: Duration,
        outcome: Outcome,
    ) -> Self {
        let succeeded = if outcome.is_success() { count } else { 0 };
        Self {
            model: model.into(),
            phase: Phase::Inference,
            duration,
            attempted: count,
            succeeded,
            outcome,
        }
    }

    /// Whole predict call: `attempted` inputs, `succeeded` predictions returned
    pub fn predict(
        model: impl Into<String>,
        attempted: usize,
        succeeded: usize,
        duration: Duration,
        outcome: Outcome,
    ) -> Self {
        Self {
            model: model.into(),
            phase: Phase::Predict,
            duration,
            attempted,
            succeeded,
            outcome,
        }
    }

    /// Model load
    pub fn load(model: impl Into<String>, duration: Duration, outcome: Outcome) -> Self {
        Self {
            model: model.into(),
            phase: Phase::Load,
            duration,
            attempted: 1,
            succeeded: usize::from(outcome.is_success()),
            outcome,
        }
    }

    /// Items that entered the phase but did not come out
    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_event_counts() {
        let event = MetricsEvent::extraction("gs://b/m", 3, 2, Duration::from_micros(40));

        assert_eq!(event.phase, Phase::Extraction);
        assert_eq!(event.attempted, 3);
        assert_eq!(event.succeeded, 2);
        assert_eq!(event.failed(), 1);
        assert!(event.outcome.is_success());
    }

    #[test]
    fn test_failed_inference_has_no_successes() {
        let event = MetricsEvent::inference("m", 4, Duration::ZERO, Outcome::Failure("inference"));
        assert_eq!(event.succeeded, 0);
        assert_eq!(event.outcome.label(), "inference");
    }
}
