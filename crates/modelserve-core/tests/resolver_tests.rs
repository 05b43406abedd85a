//! Resolver integration tests
//!
//! Exercise the scheme table end to end with real files and custom handlers.

use async_trait::async_trait;
use modelserve_core::{
    BundledResources, ByteStream, Error, LocalFileSystem, Locator, ResourceResolver, Result,
    SchemeHandler,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Handler that serves a fixed payload and counts opens
#[derive(Debug, Default)]
struct CountingHandler {
    opens: Arc<AtomicUsize>,
}

#[async_trait]
impl SchemeHandler for CountingHandler {
    fn name(&self) -> &str {
        "counting"
    }

    async fn open(&self, locator: &Locator) -> Result<ByteStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(Cursor::new(locator.rest().as_bytes().to_vec())))
    }
}

#[tokio::test]
async fn test_read_local_file_through_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"features": []}"#).unwrap();

    let resolver = ResourceResolver::standard();

    let text = resolver
        .read_to_string(path.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(text, r#"{"features": []}"#);

    let url = format!("file://{}", path.display());
    let bytes = resolver.read(&url).await.unwrap();
    assert_eq!(&bytes[..], br#"{"features": []}"#);
}

#[tokio::test]
async fn test_custom_scheme_is_routed() {
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = ResourceResolver::builder()
        .with_scheme("mem", CountingHandler { opens: Arc::clone(&opens) })
        .with_scheme("", LocalFileSystem::new())
        .build();

    let bytes = resolver.read("mem:payload").await.unwrap();

    assert_eq!(&bytes[..], b"payload");
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_scheme_never_falls_back() {
    let opens = Arc::new(AtomicUsize::new(0));
    let resolver = ResourceResolver::builder()
        .with_scheme("", CountingHandler { opens: Arc::clone(&opens) })
        .build();

    for locator in ["gs://bucket/model.pb", "hdfs:///model.pb", "resource:///x"] {
        let err = resolver.read(locator).await.unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedScheme { .. }),
            "{locator} should fail closed, got {err:?}"
        );
    }

    assert_eq!(opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bundle_replaces_default_resource_scheme() {
    let resolver = modelserve_core::ResolverBuilder::standard()
        .with_scheme(
            "resource",
            BundledResources::new().with_entry("iris/settings.json", "{}"),
        )
        .build();

    let text = resolver
        .read_to_string("resource:///iris/settings.json")
        .await
        .unwrap();
    assert_eq!(text, "{}");

    let err = resolver.read("resource:///missing.json").await.unwrap_err();
    assert!(matches!(err, Error::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_invalid_utf8_is_io_error() {
    let resolver = ResourceResolver::builder()
        .with_scheme(
            "resource",
            BundledResources::new().with_entry("bin", vec![0xff, 0xfe, 0xfd]),
        )
        .build();

    let err = resolver.read_to_string("resource:bin").await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
