//! Shared readiness futures
//!
//! A [`Readiness`] resolves once, to either a loaded instance or the load
//! failure, and every clone observes the same result. Waiting never drives or
//! cancels the load itself: the load runs as its own task.

use crate::instance::ModelInstance;
use futures::future::{BoxFuture, FutureExt, Shared};
use modelserve_core::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Resolved value of a load, shared by every waiter
pub type LoadResult<M, I, V> = std::result::Result<Arc<ModelInstance<M, I, V>>, Arc<Error>>;

/// Multi-reader handle on a single model load
pub struct Readiness<M, I, V> {
    inner: Shared<BoxFuture<'static, LoadResult<M, I, V>>>,
    report: Arc<LoadReport>,
}

/// Bookkeeping for the single `load` metrics event of a load
#[derive(Debug, Default)]
struct LoadReport {
    elapsed: OnceLock<Duration>,
    claimed: AtomicBool,
}

impl<M, I, V> Clone for Readiness<M, I, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            report: Arc::clone(&self.report),
        }
    }
}

impl<M, I, V> Readiness<M, I, V> {
    pub(crate) fn new(load: BoxFuture<'static, LoadResult<M, I, V>>) -> Self {
        Self {
            inner: load.shared(),
            report: Arc::new(LoadReport::default()),
        }
    }

    /// Readiness for a load that reports how long it took
    pub(crate) fn timed(load: BoxFuture<'static, (LoadResult<M, I, V>, Duration)>) -> Self
    where
        M: Send + Sync + 'static,
        I: 'static,
        V: 'static,
    {
        let report = Arc::new(LoadReport::default());
        let timing = Arc::clone(&report);
        let inner = async move {
            let (result, elapsed) = load.await;
            let _ = timing.elapsed.set(elapsed);
            result
        }
        .boxed()
        .shared();

        Self { inner, report }
    }

    /// A readiness that has already failed
    ///
    /// No load ran, so there is no `load` event to report.
    pub(crate) fn failed(error: Error) -> Self
    where
        M: Send + Sync + 'static,
        I: 'static,
        V: 'static,
    {
        let error = Arc::new(error);
        let readiness = Self::new(futures::future::ready(Err(error)).boxed());
        readiness.report.claimed.store(true, Ordering::Release);
        readiness
    }

    /// Wait up to `timeout` for the load to resolve
    ///
    /// Expiry fails with `Error::ModelNotReady` and leaves the load running.
    /// A zero timeout checks once without waiting. A failed load yields
    /// `Error::ModelUnavailable` carrying the cached cause.
    pub async fn await_ready(&self, timeout: Duration) -> Result<Arc<ModelInstance<M, I, V>>> {
        let waiter = self.inner.clone();
        let resolved = if timeout.is_zero() {
            waiter.now_or_never()
        } else {
            tokio::time::timeout(timeout, waiter).await.ok()
        };

        match resolved {
            Some(Ok(instance)) => Ok(instance),
            Some(Err(cause)) => Err(Error::ModelUnavailable { cause }),
            None => Err(Error::ModelNotReady { timeout }),
        }
    }

    /// The result, if the load has resolved
    pub fn peek(&self) -> Option<LoadResult<M, I, V>> {
        if let Some(result) = self.inner.peek() {
            return Some(result.clone());
        }
        self.inner.clone().now_or_never()
    }

    /// Whether the load has resolved (successfully or not)
    pub fn is_ready(&self) -> bool {
        self.peek().is_some()
    }

    /// The instance, if the load resolved successfully
    pub fn instance(&self) -> Option<Arc<ModelInstance<M, I, V>>> {
        self.peek().and_then(|result| result.ok())
    }

    /// How long the load took, once it has resolved
    pub fn load_duration(&self) -> Option<Duration> {
        match self.peek()? {
            Ok(instance) => Some(instance.load_duration()),
            Err(_) => Some(self.report.elapsed.get().copied().unwrap_or_default()),
        }
    }

    /// Claim the right to report this load's outcome
    ///
    /// True for exactly one caller, and only once the load has resolved.
    pub(crate) fn claim_report(&self) -> bool {
        self.is_ready() && !self.report.claimed.swap(true, Ordering::AcqRel)
    }

    /// Whether both handles refer to the same load
    pub fn same_load(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl<M, I, V> fmt::Debug for Readiness<M, I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.peek() {
            Some(Ok(_)) => "ready",
            Some(Err(_)) => "failed",
            None => "pending",
        };
        f.debug_struct("Readiness").field("state", &state).finish()
    }
}
