//! modelserve Predictor
//!
//! Asynchronous model loading and prediction.
//!
//! This crate provides:
//! - A de-duplicating [`ModelLoader`] that loads each model once and shares a
//!   [`Readiness`] handle with every caller
//! - Feature extraction adapters and a settings-driven extractor
//! - The [`Predictor`] call contract: readiness, extraction, inference, metrics
//! - YAML model configuration
//!
//! ```no_run
//! use modelserve_predictor::prelude::*;
//! use modelserve_predictor::{extract_fn, FixedExtractor};
//!
//! # async fn run() -> modelserve_core::Result<()> {
//! let scale = |artifact: &Artifact| -> Result<f64> {
//!     std::str::from_utf8(artifact.bytes())
//!         .ok()
//!         .and_then(|s| s.trim().parse().ok())
//!         .ok_or_else(|| Error::model_parse("expected a scale factor"))
//! };
//! let infer = |factor: &f64, vectors: Vec<f64>| -> Result<Vec<f64>> {
//!     Ok(vectors.into_iter().map(|v| v * factor).collect())
//! };
//!
//! let predictor = Predictor::builder(ModelDescriptor::new("/models/scale.txt"), infer)
//!     .model(scale, FixedExtractor::new(extract_fn(|x: &f64| Ok(*x))))
//!     .build()?;
//!
//! let predictions = predictor.predict(vec![0.0, 1.0, 7.0]).await?;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod descriptor;
pub mod executor;
pub mod extract;
pub mod features;
pub mod inference;
pub mod instance;
pub mod loader;
pub mod predictor;
pub mod readiness;

pub use artifact::{Artifact, ModelFactory};
pub use config::{ExecutorKind, ModelConfig};
pub use descriptor::{DescriptorKey, ModelDescriptor};
pub use executor::LoadExecutor;
pub use extract::{extract_fn, ExtractFn, FeatureExtractor, FixedExtractor, FnExtractor};
pub use features::{
    CompiledFeatures, FeatureRecord, FeatureSettings, FeatureValue, SettingsExtractor, Transformer,
};
pub use inference::{per_vector, InferenceFn};
pub use instance::{ModelGuard, ModelInstance};
pub use loader::{ModelLoader, ModelLoaderBuilder};
pub use predictor::{
    ExtractionFailurePolicy, PredictOutcome, Predictor, PredictorBuilder, PredictorOptions,
    DEFAULT_LOAD_TIMEOUT,
};
pub use readiness::{LoadResult, Readiness};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifact::{Artifact, ModelFactory};
    pub use crate::descriptor::ModelDescriptor;
    pub use crate::extract::{ExtractFn, FeatureExtractor};
    pub use crate::inference::InferenceFn;
    pub use crate::loader::ModelLoader;
    pub use crate::predictor::{ExtractionFailurePolicy, Predictor};
    pub use modelserve_core::prelude::*;
}
