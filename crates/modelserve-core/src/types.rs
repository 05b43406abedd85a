//! Core types shared across the prediction pipeline

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};

/// Outcome of extracting features from a single input
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<I, V> {
    /// The original input
    pub input: I,

    /// The extracted vector, or why extraction failed
    pub result: Result<V, ExtractionError>,
}

impl<I, V> Extracted<I, V> {
    /// A successfully extracted item
    pub fn ok(input: I, value: V) -> Self {
        Self {
            input,
            result: Ok(value),
        }
    }

    /// A failed item
    pub fn failed(input: I, error: ExtractionError) -> Self {
        Self {
            input,
            result: Err(error),
        }
    }

    /// Check if extraction succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Split into a feature vector or a failure record
    pub fn into_vector(self) -> Result<FeatureVector<I, V>, ExtractionFailure<I>> {
        match self.result {
            Ok(value) => Ok(FeatureVector {
                input: self.input,
                value,
            }),
            Err(error) => Err(ExtractionFailure {
                input: self.input,
                error,
            }),
        }
    }
}

/// A feature vector tagged with the input it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<I, V> {
    /// The original input
    pub input: I,

    /// Extracted features
    pub value: V,
}

/// An input that failed extraction, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure<I> {
    /// The original input
    pub input: I,

    /// Why extraction failed
    pub error: ExtractionError,
}

/// Split extraction results into surviving vectors and failures.
///
/// Both sequences keep the relative order of the original batch.
pub fn partition<I, V>(
    extracted: Vec<Extracted<I, V>>,
) -> (Vec<FeatureVector<I, V>>, Vec<ExtractionFailure<I>>) {
    let mut vectors = Vec::with_capacity(extracted.len());
    let mut failures = Vec::new();

    for item in extracted {
        match item.into_vector() {
            Ok(vector) => vectors.push(vector),
            Err(failure) => failures.push(failure),
        }
    }

    (vectors, failures)
}

/// A prediction: the original input paired with the model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction<I, O> {
    /// The original input
    pub input: I,

    /// Inference output for this input
    pub value: O,
}

impl<I, O> Prediction<I, O> {
    /// Create a new prediction
    pub fn new(input: I, value: O) -> Self {
        Self { input, value }
    }

    /// Consume and return the output
    pub fn into_value(self) -> O {
        self.value
    }
}
