//! Feature extraction adapters
//!
//! A [`FeatureExtractor`] is compiled once per model load from the settings
//! text into an [`ExtractFn`]. The compiled function is applied to every
//! batch and reports failures per item instead of failing the batch.

use modelserve_core::{Error, ExtractionError, Extracted, Result};
use std::sync::Arc;

/// A compiled, reusable extraction function
pub trait ExtractFn<I, V>: Send + Sync {
    /// Extract features for a batch, one entry per input in input order
    fn apply(&self, inputs: Vec<I>) -> Vec<Extracted<I, V>>;
}

/// Compiles feature-extraction settings into an [`ExtractFn`]
pub trait FeatureExtractor<I, V>: Send + Sync + 'static {
    /// Compile the settings text (absent when the descriptor has no settings)
    ///
    /// Failures should be reported as `Error::SettingsCompilation`.
    fn prepare(&self, settings: Option<&str>) -> Result<Arc<dyn ExtractFn<I, V>>>;
}

/// Per-item extraction from a closure
pub struct PerItem<F>(F);

impl<I, V, F> ExtractFn<I, V> for PerItem<F>
where
    F: Fn(&I) -> std::result::Result<V, ExtractionError> + Send + Sync,
{
    fn apply(&self, inputs: Vec<I>) -> Vec<Extracted<I, V>> {
        inputs
            .into_iter()
            .map(|input| match (self.0)(&input) {
                Ok(value) => Extracted::ok(input, value),
                Err(error) => Extracted::failed(input, error),
            })
            .collect()
    }
}

/// Build an [`ExtractFn`] that applies `f` to each input
pub fn extract_fn<I, V, F>(f: F) -> Arc<dyn ExtractFn<I, V>>
where
    I: 'static,
    V: 'static,
    F: Fn(&I) -> std::result::Result<V, ExtractionError> + Send + Sync + 'static,
{
    Arc::new(PerItem(f))
}

/// [`FeatureExtractor`] backed by a compile closure
pub struct FnExtractor<F> {
    compile: F,
}

impl<F> FnExtractor<F> {
    pub fn new(compile: F) -> Self {
        Self { compile }
    }
}

impl<I, V, F> FeatureExtractor<I, V> for FnExtractor<F>
where
    F: Fn(Option<&str>) -> Result<Arc<dyn ExtractFn<I, V>>> + Send + Sync + 'static,
{
    fn prepare(&self, settings: Option<&str>) -> Result<Arc<dyn ExtractFn<I, V>>> {
        (self.compile)(settings)
    }
}

/// [`FeatureExtractor`] that ignores settings and always uses the same function
pub struct FixedExtractor<I, V> {
    extract: Arc<dyn ExtractFn<I, V>>,
}

impl<I, V> FixedExtractor<I, V> {
    pub fn new(extract: Arc<dyn ExtractFn<I, V>>) -> Self {
        Self { extract }
    }
}

impl<I: 'static, V: 'static> FeatureExtractor<I, V> for FixedExtractor<I, V> {
    fn prepare(&self, _settings: Option<&str>) -> Result<Arc<dyn ExtractFn<I, V>>> {
        Ok(Arc::clone(&self.extract))
    }
}

/// Normalize a compile failure into `Error::SettingsCompilation`, keeping the
/// original error as its source
pub(crate) fn as_settings_error(error: Error) -> Error {
    match error {
        Error::SettingsCompilation { .. } => error,
        other => Error::settings_caused_by(other.to_string(), other),
    }
}
