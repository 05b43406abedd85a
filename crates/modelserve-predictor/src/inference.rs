//! Inference functions

use modelserve_core::Result;

/// Runs a model over a batch of feature vectors
///
/// Must return exactly one output per vector, in vector order. Any error
/// fails the whole batch.
pub trait InferenceFn<M, V, O>: Send + Sync + 'static {
    fn infer(&self, model: &M, vectors: Vec<V>) -> Result<Vec<O>>;
}

impl<M, V, O, F> InferenceFn<M, V, O> for F
where
    F: Fn(&M, Vec<V>) -> Result<Vec<O>> + Send + Sync + 'static,
{
    fn infer(&self, model: &M, vectors: Vec<V>) -> Result<Vec<O>> {
        self(model, vectors)
    }
}

/// Inference function that maps each vector independently
pub fn per_vector<M, V, O, F>(f: F) -> impl InferenceFn<M, V, O>
where
    M: 'static,
    V: 'static,
    O: 'static,
    F: Fn(&M, V) -> Result<O> + Send + Sync + 'static,
{
    move |model: &M, vectors: Vec<V>| -> Result<Vec<O>> {
        vectors.into_iter().map(|v| f(model, v)).collect()
    }
}
