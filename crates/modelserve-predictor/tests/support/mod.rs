//! Mock components shared by the predictor integration tests
//!
//! - `MemoryStore`: an in-memory scheme handler that counts opens and can
//!   hold every open behind a gate
//! - `ScaleFactory`: parses an artifact holding a scale factor and counts
//!   parses and drops of the resulting model
//! - `number_extractor`: extraction over `f64` inputs where NaN fails

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use modelserve_core::{
    ByteStream, Error, ExtractionError, Locator, ResourceResolver, Result, SchemeHandler,
};
use modelserve_predictor::{
    extract_fn, Artifact, ExtractFn, FeatureExtractor, FnExtractor, ModelFactory,
    ModelLoader,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const SCHEME: &str = "mem";

/// Route `tracing` output through the test harness (`RUST_LOG` filters it)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Releases every open held by a gated [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn open(&self) {
        self.0.add_permits(1024);
    }
}

/// In-memory scheme handler
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Bytes>,
    opens: Arc<Mutex<HashMap<String, usize>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, data: impl Into<Bytes>) -> Self {
        self.entries.insert(name.to_string(), data.into());
        self
    }

    /// Hold every open until the returned gate is opened
    pub fn gated(mut self) -> (Self, Gate) {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&semaphore));
        (self, Gate(semaphore))
    }

    /// Times `name` has been opened
    pub fn opens(&self, name: &str) -> usize {
        self.opens.lock().get(name).copied().unwrap_or(0)
    }

    pub fn resolver(&self) -> ResourceResolver {
        ResourceResolver::builder()
            .with_scheme(SCHEME, self.clone())
            .build()
    }
}

#[async_trait]
impl SchemeHandler for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open(&self, locator: &Locator) -> Result<ByteStream> {
        let name = locator.rest().trim_start_matches('/').to_string();
        *self.opens.lock().entry(name.clone()).or_insert(0) += 1;

        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| Error::internal("gate closed"))?;
        }

        match self.entries.get(&name) {
            Some(data) => Ok(Box::pin(Cursor::new(data.clone()))),
            None => Err(Error::not_found(locator.as_str())),
        }
    }
}

/// Locator for an entry in the memory store
pub fn uri(name: &str) -> String {
    format!("{}:{}", SCHEME, name)
}

/// Loaded model: multiplies every feature by `factor`
#[derive(Debug)]
pub struct ScaleModel {
    pub factor: f64,
    pub labels: Option<String>,
    drops: Arc<AtomicUsize>,
}

impl Drop for ScaleModel {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds `ScaleModel`s from artifacts containing a number
#[derive(Debug, Clone, Default)]
pub struct ScaleFactory {
    parses: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl ScaleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl ModelFactory<ScaleModel> for ScaleFactory {
    fn build(&self, artifact: &Artifact) -> Result<ScaleModel> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        let factor = std::str::from_utf8(artifact.bytes())
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| Error::model_parse(format!("'{}' is not a scale", artifact.locator())))?;
        let labels = artifact
            .auxiliary("labels")
            .map(|b| String::from_utf8_lossy(b).into_owned());

        Ok(ScaleModel {
            factor,
            labels,
            drops: Arc::clone(&self.drops),
        })
    }
}

/// Identity extraction over numbers; NaN inputs fail
///
/// Settings, when present, must be valid JSON.
pub fn number_extractor() -> impl FeatureExtractor<f64, f64> {
    FnExtractor::new(|settings: Option<&str>| -> Result<Arc<dyn ExtractFn<f64, f64>>> {
        if let Some(settings) = settings {
            serde_json::from_str::<serde_json::Value>(settings)
                .map_err(|e| Error::settings(e.to_string()))?;
        }
        Ok(extract_fn(|x: &f64| {
            if x.is_nan() {
                Err(ExtractionError::InvalidValue {
                    feature: "x".to_string(),
                    reason: "NaN".to_string(),
                })
            } else {
                Ok(*x)
            }
        }))
    })
}

/// Multiply each vector by the model's factor
pub fn scale(model: &ScaleModel, vectors: Vec<f64>) -> Result<Vec<f64>> {
    Ok(vectors.into_iter().map(|v| v * model.factor).collect())
}

pub type ScaleLoader = ModelLoader<ScaleModel, f64, f64>;

pub fn loader(store: &MemoryStore, factory: &ScaleFactory) -> ScaleLoader {
    init_tracing();
    ModelLoader::builder(factory.clone(), number_extractor())
        .resolver(store.resolver())
        .build()
        .unwrap()
}
