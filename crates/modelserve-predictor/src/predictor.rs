//! Predictor: readiness, extraction, inference, and metrics in one call
//!
//! Failure isolation:
//! - an input whose extraction fails is dropped from the batch (or fails the
//!   batch under [`ExtractionFailurePolicy::Fail`]);
//! - an inference failure fails the whole batch;
//! - a load failure fails every call until the model is reloaded.
//!
//! Each call emits one `extraction`, one `inference` and one `predict` event.
//! The first call to observe a resolved load also emits its `load` event; the
//! loader itself never records metrics.

use crate::artifact::ModelFactory;
use crate::descriptor::ModelDescriptor;
use crate::executor::LoadExecutor;
use crate::extract::FeatureExtractor;
use crate::inference::InferenceFn;
use crate::loader::{ModelLoader, ModelLoaderBuilder};
use crate::readiness::Readiness;
use modelserve_core::{
    partition, Error, ExtractionFailure, FeatureVector, Prediction, ResourceResolver, Result,
};
use modelserve_telemetry::{MetricsEvent, MetricsSink, NoopSink, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default readiness wait
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do with inputs whose feature extraction fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailurePolicy {
    /// Drop the input from the batch and continue
    #[default]
    Drop,

    /// Fail the batch with the first extraction error
    Fail,
}

/// Tunables for a [`Predictor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorOptions {
    /// How long `predict` waits for the model to become ready
    pub load_timeout: Duration,

    pub extraction_failures: ExtractionFailurePolicy,
}

impl Default for PredictorOptions {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            extraction_failures: ExtractionFailurePolicy::Drop,
        }
    }
}

/// Predictions plus the inputs dropped during extraction
#[derive(Debug, Clone, PartialEq)]
pub struct PredictOutcome<I, O> {
    pub predictions: Vec<Prediction<I, O>>,
    pub failures: Vec<ExtractionFailure<I>>,
}

impl<I, O> PredictOutcome<I, O> {
    fn empty() -> Self {
        Self {
            predictions: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Serves predictions for one model descriptor
pub struct Predictor<M, I, V, O> {
    loader: ModelLoader<M, I, V>,
    descriptor: ModelDescriptor,
    inference: Arc<dyn InferenceFn<M, V, O>>,
    metrics: Arc<dyn MetricsSink>,
    options: PredictorOptions,
}

impl<M, I, V, O> Predictor<M, I, V, O>
where
    M: Send + Sync + 'static,
    I: Send + 'static,
    V: Send + 'static,
    O: Send + 'static,
{
    /// Start building a predictor for a descriptor
    pub fn builder<F>(descriptor: ModelDescriptor, inference: F) -> PredictorBuilder<M, I, V, O>
    where
        F: InferenceFn<M, V, O>,
    {
        PredictorBuilder::new(descriptor, Arc::new(inference))
    }

    /// Predict a batch using the configured load timeout
    ///
    /// Returns one prediction per input that survived extraction, in input
    /// order. An empty batch returns immediately without touching the model.
    pub async fn predict(&self, inputs: Vec<I>) -> Result<Vec<Prediction<I, O>>> {
        self.predict_detailed(inputs).await.map(|outcome| outcome.predictions)
    }

    /// Predict a batch, waiting at most `timeout` for the model
    pub async fn predict_with_timeout(
        &self,
        inputs: Vec<I>,
        timeout: Duration,
    ) -> Result<Vec<Prediction<I, O>>> {
        self.run(inputs, timeout).await.map(|outcome| outcome.predictions)
    }

    /// Predict a batch and also report the inputs dropped by extraction
    pub async fn predict_detailed(&self, inputs: Vec<I>) -> Result<PredictOutcome<I, O>> {
        self.run(inputs, self.options.load_timeout).await
    }

    /// Start loading the model without predicting
    pub fn warm_up(&self) -> Readiness<M, I, V> {
        self.loader.load(&self.descriptor)
    }

    /// Drop the cached load and start a fresh one
    ///
    /// The previous instance, if it loaded, is released once in-flight
    /// predictions finish.
    pub async fn reload(&self) -> Readiness<M, I, V> {
        if let Some(previous) = self.loader.reset(&self.descriptor) {
            if let Some(instance) = previous.instance() {
                instance.release().await;
            }
        }
        self.loader.load(&self.descriptor)
    }

    /// Release this predictor's model
    ///
    /// Later predictions start a new load. Returns whether an instance was
    /// released. Use [`ModelLoader::close`] to shut the whole loader down.
    pub async fn close(&self) -> bool {
        match self.loader.reset(&self.descriptor).and_then(|r| r.instance()) {
            Some(instance) => instance.release().await,
            None => false,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    pub fn loader(&self) -> &ModelLoader<M, I, V> {
        &self.loader
    }

    pub fn options(&self) -> &PredictorOptions {
        &self.options
    }

    async fn run(&self, inputs: Vec<I>, timeout: Duration) -> Result<PredictOutcome<I, O>> {
        let start = Instant::now();
        let attempted = inputs.len();

        let result = if inputs.is_empty() {
            Ok(PredictOutcome::empty())
        } else {
            self.run_batch(inputs, timeout).await
        };

        let (succeeded, outcome) = match &result {
            Ok(outcome) => (outcome.predictions.len(), Outcome::Success),
            Err(error) => (0, Outcome::Failure(error.kind())),
        };
        self.metrics.record(&MetricsEvent::predict(
            self.model(),
            attempted,
            succeeded,
            start.elapsed(),
            outcome,
        ));

        result
    }

    async fn run_batch(&self, inputs: Vec<I>, timeout: Duration) -> Result<PredictOutcome<I, O>> {
        let readiness = self.loader.load(&self.descriptor);
        let ready = readiness.await_ready(timeout).await;
        self.report_load(&readiness);
        let instance = ready?;
        let model = instance.acquire().await?;

        let extraction_start = Instant::now();
        let attempted = inputs.len();
        let (vectors, failures) = partition(instance.extract_fn().apply(inputs));
        self.metrics.record(&MetricsEvent::extraction(
            self.model(),
            attempted,
            vectors.len(),
            extraction_start.elapsed(),
        ));

        for failure in &failures {
            debug!("Extraction failed for '{}': {}", self.model(), failure.error);
        }
        if self.options.extraction_failures == ExtractionFailurePolicy::Fail {
            if let Some(failure) = failures.first() {
                return Err(Error::Extraction(failure.error.clone()));
            }
        }

        self.infer(&model, vectors, failures)
    }

    fn infer(
        &self,
        model: &M,
        vectors: Vec<FeatureVector<I, V>>,
        failures: Vec<ExtractionFailure<I>>,
    ) -> Result<PredictOutcome<I, O>> {
        let inference_start = Instant::now();
        let count = vectors.len();
        let (inputs, values): (Vec<I>, Vec<V>) =
            vectors.into_iter().map(|v| (v.input, v.value)).unzip();

        let outputs = if count == 0 {
            Ok(Vec::new())
        } else {
            self.inference
                .infer(model, values)
                .map_err(|e| match e {
                    Error::Inference { .. } => e,
                    other => Error::inference_caused_by(other.to_string(), other),
                })
                .and_then(|outputs| {
                    if outputs.len() == count {
                        Ok(outputs)
                    } else {
                        Err(Error::inference(format!(
                            "expected {} outputs, got {}",
                            count,
                            outputs.len()
                        )))
                    }
                })
        };

        let outcome = match &outputs {
            Ok(_) => Outcome::Success,
            Err(error) => Outcome::Failure(error.kind()),
        };
        self.metrics.record(&MetricsEvent::inference(
            self.model(),
            count,
            inference_start.elapsed(),
            outcome,
        ));

        let predictions = inputs
            .into_iter()
            .zip(outputs?)
            .map(|(input, value)| Prediction::new(input, value))
            .collect();

        Ok(PredictOutcome {
            predictions,
            failures,
        })
    }

    /// Emit the `load` event for a resolved load, once per load
    fn report_load(&self, readiness: &Readiness<M, I, V>) {
        if !readiness.claim_report() {
            return;
        }
        let Some(result) = readiness.peek() else {
            return;
        };
        let duration = readiness.load_duration().unwrap_or_default();
        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(cause) => Outcome::Failure(cause.kind()),
        };
        self.metrics.record(&MetricsEvent::load(self.model(), duration, outcome));
    }

    fn model(&self) -> &str {
        self.descriptor.model_uri()
    }
}

impl<M, I, V, O> fmt::Debug for Predictor<M, I, V, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("model_uri", &self.descriptor.model_uri())
            .field("options", &self.options)
            .finish()
    }
}

enum LoaderSource<M, I, V> {
    Shared(ModelLoader<M, I, V>),
    Owned {
        factory: Arc<dyn ModelFactory<M>>,
        extractor: Arc<dyn FeatureExtractor<I, V>>,
    },
}

/// Builder for [`Predictor`]
///
/// Either share an existing loader with [`loader`](Self::loader) or give a
/// factory and extractor to build a private one.
pub struct PredictorBuilder<M, I, V, O> {
    descriptor: ModelDescriptor,
    inference: Arc<dyn InferenceFn<M, V, O>>,
    source: Option<LoaderSource<M, I, V>>,
    resolver: Option<ResourceResolver>,
    executor: Option<LoadExecutor>,
    metrics: Option<Arc<dyn MetricsSink>>,
    options: PredictorOptions,
}

impl<M, I, V, O> PredictorBuilder<M, I, V, O>
where
    M: Send + Sync + 'static,
    I: Send + 'static,
    V: Send + 'static,
    O: Send + 'static,
{
    pub fn new(descriptor: ModelDescriptor, inference: Arc<dyn InferenceFn<M, V, O>>) -> Self {
        Self {
            descriptor,
            inference,
            source: None,
            resolver: None,
            executor: None,
            metrics: None,
            options: PredictorOptions::default(),
        }
    }

    /// Share an existing loader
    pub fn loader(mut self, loader: ModelLoader<M, I, V>) -> Self {
        self.source = Some(LoaderSource::Shared(loader));
        self
    }

    /// Build a private loader from a factory and extractor
    pub fn model<F, E>(mut self, factory: F, extractor: E) -> Self
    where
        F: ModelFactory<M>,
        E: FeatureExtractor<I, V>,
    {
        self.source = Some(LoaderSource::Owned {
            factory: Arc::new(factory),
            extractor: Arc::new(extractor),
        });
        self
    }

    /// Resolver for a private loader
    pub fn resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Default executor for a private loader
    pub fn executor(mut self, executor: LoadExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Metrics sink for predictor events
    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn options(mut self, options: PredictorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.options.load_timeout = timeout;
        self
    }

    pub fn extraction_failures(mut self, policy: ExtractionFailurePolicy) -> Self {
        self.options.extraction_failures = policy;
        self
    }

    pub fn build(self) -> Result<Predictor<M, I, V, O>> {
        let metrics: Arc<dyn MetricsSink> = self.metrics.unwrap_or_else(|| Arc::new(NoopSink));

        let loader = match self.source {
            Some(LoaderSource::Shared(loader)) => loader,
            Some(LoaderSource::Owned { factory, extractor }) => {
                let mut builder = ModelLoaderBuilder::new(factory, extractor);
                if let Some(resolver) = self.resolver {
                    builder = builder.resolver(resolver);
                }
                if let Some(executor) = self.executor {
                    builder = builder.executor(executor);
                }
                builder.build()?
            }
            None => {
                return Err(Error::config(
                    "predictor needs a loader or a model factory and extractor",
                ))
            }
        };

        Ok(Predictor {
            loader,
            descriptor: self.descriptor,
            inference: self.inference,
            metrics,
            options: self.options,
        })
    }
}
