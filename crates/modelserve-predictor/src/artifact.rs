//! Model artifacts and the factories that turn them into model state

use bytes::Bytes;
use modelserve_core::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The raw bytes of a model artifact plus its auxiliary resources
#[derive(Debug, Clone)]
pub struct Artifact {
    locator: String,
    bytes: Bytes,
    auxiliary: BTreeMap<String, Bytes>,
    digest: String,
}

impl Artifact {
    /// Wrap fetched artifact bytes, computing their SHA-256 digest
    pub fn new(
        locator: impl Into<String>,
        bytes: Bytes,
        auxiliary: BTreeMap<String, Bytes>,
    ) -> Self {
        let digest = format!("{:x}", Sha256::digest(&bytes));
        Self {
            locator: locator.into(),
            bytes,
            auxiliary,
            digest,
        }
    }

    /// Locator the artifact was read from
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Auxiliary resource by descriptor name
    pub fn auxiliary(&self, name: &str) -> Option<&Bytes> {
        self.auxiliary.get(name)
    }

    pub fn auxiliary_names(&self) -> impl Iterator<Item = &str> {
        self.auxiliary.keys().map(|k| k.as_str())
    }

    /// Hex-encoded SHA-256 of the artifact bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Builds model state from an artifact
///
/// Runs on a blocking thread of the load executor. Parse failures should be
/// reported as `Error::ModelParse`.
pub trait ModelFactory<M>: Send + Sync + 'static {
    fn build(&self, artifact: &Artifact) -> Result<M>;
}

impl<M, F> ModelFactory<M> for F
where
    F: Fn(&Artifact) -> Result<M> + Send + Sync + 'static,
{
    fn build(&self, artifact: &Artifact) -> Result<M> {
        self(artifact)
    }
}
