//! Loaded model instances

use crate::descriptor::ModelDescriptor;
use crate::extract::ExtractFn;
use modelserve_core::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

/// Read access to a model's state, held for the duration of a prediction
pub type ModelGuard<'a, M> = RwLockReadGuard<'a, M>;

/// A loaded model: runtime state plus its compiled extraction function
///
/// Predictions take the read side of the state lock. [`release`](Self::release)
/// takes the write side, so it waits for in-flight predictions and makes
/// later ones fail with `Error::Released`.
pub struct ModelInstance<M, I, V> {
    id: Uuid,
    descriptor: ModelDescriptor,
    digest: String,
    loaded_at: SystemTime,
    load_duration: Duration,
    state: RwLock<Option<M>>,
    released: AtomicBool,
    extract: Arc<dyn ExtractFn<I, V>>,
}

impl<M, I, V> ModelInstance<M, I, V> {
    pub(crate) fn new(
        descriptor: ModelDescriptor,
        digest: String,
        load_duration: Duration,
        state: M,
        extract: Arc<dyn ExtractFn<I, V>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            descriptor,
            digest,
            loaded_at: SystemTime::now(),
            load_duration,
            state: RwLock::new(Some(state)),
            released: AtomicBool::new(false),
            extract,
        }
    }

    /// Unique id of this instance
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Hex-encoded SHA-256 of the artifact this instance was built from
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// Time from load start until the instance was assembled
    pub fn load_duration(&self) -> Duration {
        self.load_duration
    }

    /// Compiled extraction function
    pub fn extract_fn(&self) -> &Arc<dyn ExtractFn<I, V>> {
        &self.extract
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Acquire read access to the model state
    pub async fn acquire(&self) -> Result<ModelGuard<'_, M>> {
        let guard = self.state.read().await;
        RwLockReadGuard::try_map(guard, |state| state.as_ref()).map_err(|_| Error::Released)
    }

    /// Release the model state
    ///
    /// Waits for in-flight predictions. Returns `true` on the first call and
    /// `false` afterwards.
    pub async fn release(&self) -> bool {
        let mut state = self.state.write().await;
        match state.take() {
            Some(model) => {
                self.released.store(true, Ordering::Release);
                drop(model);
                tracing::info!(
                    "Released model '{}' (instance {})",
                    self.descriptor.model_uri(),
                    self.id
                );
                true
            }
            None => {
                tracing::warn!(
                    "Model '{}' (instance {}) was already released",
                    self.descriptor.model_uri(),
                    self.id
                );
                false
            }
        }
    }
}

impl<M, I, V> fmt::Debug for ModelInstance<M, I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("id", &self.id)
            .field("model_uri", &self.descriptor.model_uri())
            .field("digest", &self.digest)
            .field("released", &self.is_released())
            .finish()
    }
}
