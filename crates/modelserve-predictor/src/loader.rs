//! De-duplicating asynchronous model loader
//!
//! The first [`ModelLoader::load`] for a descriptor spawns the load on the
//! descriptor's executor and caches a [`Readiness`] for it. Every later call
//! for an equal descriptor returns a clone of the same readiness, so a model
//! is fetched and parsed once no matter how many callers race for it.
//! Failures are cached too; only [`ModelLoader::reset`] starts a new attempt.

use crate::artifact::{Artifact, ModelFactory};
use crate::descriptor::{DescriptorKey, ModelDescriptor};
use crate::executor::LoadExecutor;
use crate::extract::{as_settings_error, ExtractFn, FeatureExtractor};
use crate::instance::ModelInstance;
use crate::readiness::Readiness;
use futures::future::FutureExt;
use modelserve_core::{Error, ResourceResolver, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long [`ModelLoader::close`] waits for each pending load
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads model instances and caches one readiness per descriptor
pub struct ModelLoader<M, I, V> {
    inner: Arc<LoaderInner<M, I, V>>,
}

impl<M, I, V> Clone for ModelLoader<M, I, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LoaderInner<M, I, V> {
    resolver: ResourceResolver,
    factory: Arc<dyn ModelFactory<M>>,
    extractor: Arc<dyn FeatureExtractor<I, V>>,
    executor: LoadExecutor,
    cells: Mutex<HashMap<DescriptorKey, Readiness<M, I, V>>>,
    closed: AtomicBool,
    loads_started: AtomicU64,
}

impl<M, I, V> ModelLoader<M, I, V>
where
    M: Send + Sync + 'static,
    I: Send + 'static,
    V: Send + 'static,
{
    /// Start building a loader
    pub fn builder<F, E>(factory: F, extractor: E) -> ModelLoaderBuilder<M, I, V>
    where
        F: ModelFactory<M>,
        E: FeatureExtractor<I, V>,
    {
        ModelLoaderBuilder::new(Arc::new(factory), Arc::new(extractor))
    }

    /// Readiness for the descriptor, starting the load if none is cached
    ///
    /// Never blocks on the load itself.
    pub fn load(&self, descriptor: &ModelDescriptor) -> Readiness<M, I, V> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Readiness::failed(Error::Released);
        }

        let key = descriptor.key();
        let mut cells = self.inner.cells.lock();
        if let Some(existing) = cells.get(&key) {
            debug!("Reusing load of '{}'", descriptor.model_uri());
            return existing.clone();
        }

        let readiness = self.start(descriptor.clone());
        cells.insert(key, readiness.clone());
        readiness
    }

    /// Start loads for several descriptors without waiting for them
    pub fn preload<'a>(
        &self,
        descriptors: impl IntoIterator<Item = &'a ModelDescriptor>,
    ) -> Vec<Readiness<M, I, V>> {
        descriptors.into_iter().map(|d| self.load(d)).collect()
    }

    /// Forget the cached load for a descriptor so the next `load` starts over
    ///
    /// Returns the forgotten readiness. Its instance, if any, is not released
    /// here; in-flight predictions may still be using it.
    pub fn reset(&self, descriptor: &ModelDescriptor) -> Option<Readiness<M, I, V>> {
        let removed = self.inner.cells.lock().remove(&descriptor.key());
        if removed.is_some() {
            info!("Reset cached load of '{}'", descriptor.model_uri());
        }
        removed
    }

    /// Cached readiness for a descriptor, without starting a load
    pub fn cached(&self, descriptor: &ModelDescriptor) -> Option<Readiness<M, I, V>> {
        self.inner.cells.lock().get(&descriptor.key()).cloned()
    }

    /// Number of cached loads that resolved successfully
    pub fn loaded_count(&self) -> usize {
        self.inner
            .cells
            .lock()
            .values()
            .filter(|r| r.instance().is_some())
            .count()
    }

    /// Number of loads started since the loader was created
    pub fn loads_started(&self) -> u64 {
        self.inner.loads_started.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Close the loader and release every loaded instance
    ///
    /// Waits up to [`DEFAULT_CLOSE_TIMEOUT`] for each pending load. See
    /// [`close_with_timeout`](Self::close_with_timeout).
    pub async fn close(&self) -> usize {
        self.close_with_timeout(DEFAULT_CLOSE_TIMEOUT).await
    }

    /// Close the loader, waiting at most `timeout` for each pending load
    ///
    /// Later loads fail with `Error::Released`. Pending loads that resolve in
    /// time have their instances released too; a load still pending after
    /// `timeout` is abandoned and fails with `Error::Released` when it
    /// finishes, so it never produces a live instance. Returns how many
    /// instances this call released.
    pub async fn close_with_timeout(&self, timeout: Duration) -> usize {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Model loader already closed");
        }

        let cells: Vec<_> = self.inner.cells.lock().drain().collect();
        let mut released = 0;
        for (key, readiness) in cells {
            let instance = match readiness.peek() {
                Some(result) => result.ok(),
                None => match readiness.await_ready(timeout).await {
                    Ok(instance) => Some(instance),
                    Err(Error::ModelNotReady { .. }) => {
                        warn!("Abandoning pending load of '{}' on close", key.model_uri());
                        None
                    }
                    Err(_) => None,
                },
            };
            if let Some(instance) = instance {
                if instance.release().await {
                    released += 1;
                }
            }
        }

        info!("Model loader closed, released {} instances", released);
        released
    }

    fn start(&self, descriptor: ModelDescriptor) -> Readiness<M, I, V> {
        let executor = descriptor
            .executor()
            .cloned()
            .unwrap_or_else(|| self.inner.executor.clone());
        self.inner.loads_started.fetch_add(1, Ordering::Relaxed);
        info!(
            "Loading model '{}' on executor '{}'",
            descriptor.model_uri(),
            executor.name()
        );

        let started = Instant::now();
        let inner = Arc::clone(&self.inner);
        let task = executor.spawn(async move { inner.load_instance(descriptor).await });

        Readiness::timed(
            async move {
                match task.await {
                    Ok((Ok(instance), elapsed)) => (Ok(instance), elapsed),
                    Ok((Err(error), elapsed)) => (Err(Arc::new(error)), elapsed),
                    Err(join) => (
                        Err(Arc::new(Error::internal(format!(
                            "model load task failed: {}",
                            join
                        )))),
                        started.elapsed(),
                    ),
                }
            }
            .boxed(),
        )
    }
}

impl<M, I, V> LoaderInner<M, I, V>
where
    M: Send + Sync + 'static,
    I: Send + 'static,
    V: Send + 'static,
{
    async fn load_instance(
        &self,
        descriptor: ModelDescriptor,
    ) -> (Result<Arc<ModelInstance<M, I, V>>>, Duration) {
        let start = Instant::now();
        let model_uri = descriptor.model_uri().to_string();
        let result = self.build_instance(descriptor, start).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(instance) => {
                info!(
                    "Model '{}' ready in {:?} (instance {}, sha256 {})",
                    model_uri,
                    elapsed,
                    instance.id(),
                    instance.digest()
                );
            }
            Err(error) => {
                warn!("Model '{}' failed to load after {:?}: {}", model_uri, elapsed, error);
            }
        }

        (result, elapsed)
    }

    async fn build_instance(
        &self,
        descriptor: ModelDescriptor,
        start: Instant,
    ) -> Result<Arc<ModelInstance<M, I, V>>> {
        let bytes = self.resolver.read(descriptor.model_uri()).await?;
        let mut auxiliary = BTreeMap::new();
        for (name, uri) in descriptor.auxiliary_uris() {
            auxiliary.insert(name.clone(), self.resolver.read(uri).await?);
        }
        let artifact = Artifact::new(descriptor.model_uri(), bytes, auxiliary);
        let digest = artifact.digest().to_string();

        let factory = Arc::clone(&self.factory);
        let state = tokio::task::spawn_blocking(move || factory.build(&artifact))
            .await
            .map_err(|e| Error::internal(format!("model factory panicked: {}", e)))??;

        let settings = match descriptor.settings_uri() {
            Some(uri) => Some(self.resolver.read_to_string(uri).await?),
            None => None,
        };
        let extract: Arc<dyn ExtractFn<I, V>> = self
            .extractor
            .prepare(settings.as_deref())
            .map_err(as_settings_error)?;

        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Released);
        }

        Ok(Arc::new(ModelInstance::new(
            descriptor,
            digest,
            start.elapsed(),
            state,
            extract,
        )))
    }
}

impl<M, I, V> fmt::Debug for ModelLoader<M, I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLoader")
            .field("resolver", &self.inner.resolver)
            .field("executor", &self.inner.executor)
            .field("cached", &self.inner.cells.lock().len())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Builder for [`ModelLoader`]
pub struct ModelLoaderBuilder<M, I, V> {
    factory: Arc<dyn ModelFactory<M>>,
    extractor: Arc<dyn FeatureExtractor<I, V>>,
    resolver: Option<ResourceResolver>,
    executor: Option<LoadExecutor>,
}

impl<M, I, V> ModelLoaderBuilder<M, I, V>
where
    M: Send + Sync + 'static,
    I: Send + 'static,
    V: Send + 'static,
{
    pub fn new(
        factory: Arc<dyn ModelFactory<M>>,
        extractor: Arc<dyn FeatureExtractor<I, V>>,
    ) -> Self {
        Self {
            factory,
            extractor,
            resolver: None,
            executor: None,
        }
    }

    /// Resolver for artifacts, settings and auxiliary resources
    /// (default: [`ResourceResolver::standard`])
    pub fn resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Executor for descriptors that do not name one
    /// (default: the current tokio runtime)
    pub fn executor(mut self, executor: LoadExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Build the loader
    ///
    /// Fails when no executor was given and there is no current runtime.
    pub fn build(self) -> Result<ModelLoader<M, I, V>> {
        let executor = match self.executor {
            Some(executor) => executor,
            None => LoadExecutor::current()?,
        };

        Ok(ModelLoader {
            inner: Arc::new(LoaderInner {
                resolver: self.resolver.unwrap_or_default(),
                factory: self.factory,
                extractor: self.extractor,
                executor,
                cells: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                loads_started: AtomicU64::new(0),
            }),
        })
    }
}
