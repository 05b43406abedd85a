//! Background execution context for model loads

use modelserve_core::{Error, Result};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Where model loads run
///
/// Either a handle to an existing tokio runtime or a dedicated runtime owned
/// by this executor. The name identifies the executor in descriptors and logs.
#[derive(Clone)]
pub struct LoadExecutor {
    name: Arc<str>,
    handle: Handle,
    _runtime: Option<Arc<OwnedRuntime>>,
}

/// Shuts the dedicated runtime down without blocking, so it can be dropped
/// from async code.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

impl LoadExecutor {
    /// Executor backed by the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::config(format!("no tokio runtime for model loads: {}", e)))?;
        Ok(Self::from_handle("default", handle))
    }

    /// Executor backed by an existing runtime handle
    pub fn from_handle(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: Arc::from(name.into()),
            handle,
            _runtime: None,
        }
    }

    /// Executor with its own multi-threaded runtime
    pub fn dedicated(name: impl Into<String>, threads: usize) -> Result<Self> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name(format!("{}-load", name))
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("failed to build load runtime: {}", e)))?;

        tracing::info!(
            "Started dedicated load executor '{}' with {} threads",
            name,
            threads.max(1)
        );

        Ok(Self {
            name: Arc::from(name),
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Executor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn a task on this executor
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }
}

/// Worker threads for a dedicated executor when none are configured
pub fn default_threads() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl fmt::Debug for LoadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadExecutor")
            .field("name", &self.name)
            .field("dedicated", &self._runtime.is_some())
            .finish()
    }
}
