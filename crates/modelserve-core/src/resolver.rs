//! Scheme-based resource resolution
//!
//! Maps the scheme of a resource locator (`file`, `gs`, `resource`, ...) to a
//! handler that opens the resource as a byte stream. The mapping is fixed when
//! the resolver is built and is only read afterwards.

use crate::error::{Error, Result};
use crate::schemes::{BundledResources, GcsFileSystem, LocalFileSystem};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A readable resource. Dropping the stream releases it.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// A parsed resource locator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    raw: String,
    scheme: String,
}

impl Locator {
    /// Parse a locator. Locators without a valid scheme prefix map to the
    /// empty scheme (local filesystem).
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let scheme = scheme_of(&raw)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        Self { raw, scheme }
    }

    /// The full locator as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lower-cased scheme, empty when absent
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Everything after `scheme:`, or the whole locator when there is no scheme
    pub fn rest(&self) -> &str {
        if self.scheme.is_empty() {
            &self.raw
        } else {
            &self.raw[self.scheme.len() + 1..]
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Substring before the first `:` when it is a syntactically valid scheme.
///
/// Single letters are rejected so Windows drive letters stay paths.
fn scheme_of(raw: &str) -> Option<&str> {
    let (candidate, _) = raw.split_once(':')?;
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() || candidate.len() < 2 {
        return None;
    }
    chars
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        .then_some(candidate)
}

/// Opens resources for one scheme
///
/// Implementations translate handler-specific failures into
/// `Error::ResourceNotFound` or `Error::Io`.
#[async_trait]
pub trait SchemeHandler: Send + Sync + Debug {
    /// Name of this handler (for logging/debugging)
    fn name(&self) -> &str;

    /// Open the resource as a byte stream
    async fn open(&self, locator: &Locator) -> Result<ByteStream>;
}

/// Resolves locators to byte streams through an immutable scheme table
#[derive(Clone)]
pub struct ResourceResolver {
    handlers: Arc<HashMap<String, Arc<dyn SchemeHandler>>>,
}

impl ResourceResolver {
    /// Start building a resolver with no schemes registered
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    /// Resolver with the local filesystem, Cloud Storage and an empty bundle
    pub fn standard() -> Self {
        ResolverBuilder::standard().build()
    }

    /// Open a locator
    pub async fn open(&self, locator: &str) -> Result<ByteStream> {
        let locator = Locator::parse(locator);
        let handler = self.handler_for(&locator)?;
        tracing::debug!("Opening '{}' with {} handler", locator, handler.name());
        handler.open(&locator).await
    }

    /// Open a locator and read it fully
    pub async fn read(&self, locator: &str) -> Result<Bytes> {
        let mut stream = self.open(locator).await?;
        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Error::io(locator, e))?;
        Ok(Bytes::from(buf))
    }

    /// Open a locator and read it fully as UTF-8 text
    pub async fn read_to_string(&self, locator: &str) -> Result<String> {
        let bytes = self.read(locator).await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::io(
                locator,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Registered schemes
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        schemes.sort_unstable();
        schemes
    }

    fn handler_for(&self, locator: &Locator) -> Result<&Arc<dyn SchemeHandler>> {
        self.handlers
            .get(locator.scheme())
            .ok_or_else(|| Error::UnsupportedScheme {
                scheme: locator.scheme().to_string(),
                locator: locator.as_str().to_string(),
            })
    }
}

impl Default for ResourceResolver {
    fn default() -> Self {
        Self::standard()
    }
}

impl Debug for ResourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceResolver")
            .field("schemes", &self.schemes())
            .finish()
    }
}

/// Builder for the scheme table
#[derive(Default)]
pub struct ResolverBuilder {
    handlers: HashMap<String, Arc<dyn SchemeHandler>>,
}

impl ResolverBuilder {
    /// Create a builder with no schemes
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with `""`/`file`, `gs` and `resource`
    pub fn standard() -> Self {
        let local: Arc<dyn SchemeHandler> = Arc::new(LocalFileSystem::new());
        Self::new()
            .with_shared_scheme("", Arc::clone(&local))
            .with_shared_scheme("file", local)
            .with_scheme("gs", GcsFileSystem::new())
            .with_scheme("resource", BundledResources::new())
    }

    /// Register (or replace) the handler for a scheme
    pub fn with_scheme(
        self,
        scheme: impl Into<String>,
        handler: impl SchemeHandler + 'static,
    ) -> Self {
        self.with_shared_scheme(scheme, Arc::new(handler))
    }

    /// Register a handler that is shared with other schemes
    pub fn with_shared_scheme(
        mut self,
        scheme: impl Into<String>,
        handler: Arc<dyn SchemeHandler>,
    ) -> Self {
        self.handlers.insert(scheme.into().to_ascii_lowercase(), handler);
        self
    }

    /// Freeze the scheme table
    pub fn build(self) -> ResourceResolver {
        ResourceResolver {
            handlers: Arc::new(self.handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_scheme_parsing() {
        assert_eq!(Locator::parse("gs://bucket/model.pb").scheme(), "gs");
        assert_eq!(Locator::parse("file:///tmp/model.pb").scheme(), "file");
        assert_eq!(Locator::parse("/tmp/model.pb").scheme(), "");
        assert_eq!(Locator::parse("relative/model.pb").scheme(), "");
        assert_eq!(Locator::parse("RESOURCE:///settings.json").scheme(), "resource");
    }

    #[test]
    fn test_locator_rejects_non_schemes() {
        assert_eq!(Locator::parse("C:\\models\\graph.pb").scheme(), "");
        assert_eq!(Locator::parse("dir/with:colon").scheme(), "");
        assert_eq!(Locator::parse("1abc:thing").scheme(), "");
    }

    #[test]
    fn test_locator_rest() {
        assert_eq!(Locator::parse("gs://bucket/a").rest(), "//bucket/a");
        assert_eq!(Locator::parse("/tmp/a").rest(), "/tmp/a");
    }

    #[tokio::test]
    async fn test_unregistered_scheme_fails_closed() {
        let resolver = ResourceResolver::builder()
            .with_scheme("", LocalFileSystem::new())
            .build();

        let err = resolver.open("s3://bucket/model.pb").await.err().unwrap();
        match err {
            Error::UnsupportedScheme { scheme, locator } => {
                assert_eq!(scheme, "s3");
                assert_eq!(locator, "s3://bucket/model.pb");
            }
            other => panic!("expected UnsupportedScheme, got {other:?}"),
        }
    }

    #[test]
    fn test_standard_schemes() {
        let resolver = ResourceResolver::standard();
        assert_eq!(resolver.schemes(), vec!["", "file", "gs", "resource"]);
    }
}
