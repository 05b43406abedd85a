//! Google Cloud Storage handler
//!
//! Fetches `gs://bucket/object` through the JSON API media endpoint and
//! streams the body without buffering it in memory.

use crate::error::{Error, Result};
use crate::resolver::{ByteStream, Locator, SchemeHandler};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::io::ErrorKind;
use tokio_util::io::StreamReader;
use url::Url;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Environment variable holding an OAuth access token for Cloud Storage
pub const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Cloud Storage connection settings
#[derive(Debug, Clone)]
pub struct GcsConfig {
    /// API endpoint (override for emulators)
    pub endpoint: String,

    /// Bearer token; public objects need none
    pub bearer_token: Option<String>,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bearer_token: None,
        }
    }
}

impl GcsConfig {
    /// Default endpoint with the token taken from the environment, if set
    pub fn from_env() -> Self {
        Self {
            bearer_token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    /// Set the API endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// Opens `gs://` locators
#[derive(Debug, Clone)]
pub struct GcsFileSystem {
    client: reqwest::Client,
    config: GcsConfig,
}

impl GcsFileSystem {
    /// Handler configured from the environment
    pub fn new() -> Self {
        Self::with_config(GcsConfig::from_env())
    }

    /// Handler with explicit settings
    pub fn with_config(config: GcsConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Handler sharing an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: GcsConfig) -> Self {
        Self { client, config }
    }

    /// Media download URL for a `gs://bucket/object` locator
    ///
    /// The object name is taken verbatim from the locator, so `?`, `#`, `%`
    /// and spaces are part of the name and get encoded once.
    pub fn object_url(&self, locator: &Locator) -> Result<Url> {
        let invalid = |msg: String| {
            Error::io(
                locator.as_str(),
                std::io::Error::new(ErrorKind::InvalidInput, msg),
            )
        };

        let path = locator
            .rest()
            .strip_prefix("//")
            .ok_or_else(|| invalid("expected gs://bucket/object".to_string()))?;
        let (bucket, object) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(invalid("missing bucket".to_string()));
        }
        if object.is_empty() {
            return Err(invalid("missing object name".to_string()));
        }

        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| Error::config(format!("invalid Cloud Storage endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("Cloud Storage endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", object]);
        url.query_pairs_mut().append_pair("alt", "media");

        Ok(url)
    }
}

impl Default for GcsFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SchemeHandler for GcsFileSystem {
    fn name(&self) -> &str {
        "gcs"
    }

    async fn open(&self, locator: &Locator) -> Result<ByteStream> {
        let url = self.object_url(locator)?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::io(locator.as_str(), std::io::Error::new(ErrorKind::Other, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(locator.as_str()));
        }
        if !status.is_success() {
            return Err(Error::io(
                locator.as_str(),
                std::io::Error::new(ErrorKind::Other, format!("HTTP {}", status)),
            ));
        }

        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e));

        Ok(Box::pin(StreamReader::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[test]
    fn test_object_url_encodes_object_name() {
        let gcs = GcsFileSystem::with_config(GcsConfig::default());
        let url = gcs
            .object_url(&Locator::parse("gs://models/iris/v1/graph.pb"))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/models/o/iris%2Fv1%2Fgraph.pb?alt=media"
        );
    }

    #[test]
    fn test_object_url_custom_endpoint() {
        let gcs = GcsFileSystem::with_config(
            GcsConfig::default().with_endpoint("http://localhost:4443/"),
        );
        let url = gcs.object_url(&Locator::parse("gs://b/o.bin")).unwrap();

        assert_eq!(url.as_str(), "http://localhost:4443/storage/v1/b/b/o/o.bin?alt=media");
    }

    #[test]
    fn test_object_url_requires_object() {
        let gcs = GcsFileSystem::with_config(GcsConfig::default());
        for locator in ["gs://bucket/", "gs://bucket", "gs:///object", "gs:bucket/object"] {
            let err = gcs.object_url(&Locator::parse(locator)).unwrap_err();
            assert!(matches!(err, Error::Io { .. }), "{locator}");
        }
    }

    #[test]
    fn test_object_url_keeps_special_characters_in_name() {
        let gcs = GcsFileSystem::with_config(GcsConfig::default());
        let cases = [
            ("gs://models/my model.pb", "my%20model.pb"),
            ("gs://models/a?b.pb", "a%3Fb.pb"),
            ("gs://models/100%.bin", "100%25.bin"),
            ("gs://models/v1#2.pb", "v1%232.pb"),
        ];

        for (locator, encoded) in cases {
            let url = gcs.object_url(&Locator::parse(locator)).unwrap();
            assert_eq!(
                url.as_str(),
                format!("https://storage.googleapis.com/storage/v1/b/models/o/{encoded}?alt=media")
            );
        }
    }

    /// Serve one canned HTTP response on a loopback port.
    ///
    /// Returns the endpoint and a receiver for the request head.
    async fn serve_once(
        status: &'static str,
        body: &'static [u8],
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            tx.send(String::from_utf8_lossy(&head).into_owned()).ok();

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.ok();
        });

        (endpoint, rx)
    }

    fn handler(endpoint: &str, token: Option<&str>) -> GcsFileSystem {
        let mut config = GcsConfig::default().with_endpoint(endpoint);
        config.bearer_token = token.map(str::to_string);
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        GcsFileSystem::with_client(client, config)
    }

    #[tokio::test]
    async fn test_open_streams_object_body() {
        let (endpoint, request) = serve_once("200 OK", b"graph-bytes").await;
        let gcs = handler(&endpoint, Some("t0k3n"));

        let mut stream = gcs.open(&Locator::parse("gs://models/iris/graph.pb")).await.unwrap();
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"graph-bytes");

        let head = request.await.unwrap();
        assert!(head.starts_with("GET /storage/v1/b/models/o/iris%2Fgraph.pb?alt=media HTTP/1.1"));
        assert!(head.to_ascii_lowercase().contains("authorization: bearer t0k3n"));
    }

    #[tokio::test]
    async fn test_open_without_token_sends_no_authorization() {
        let (endpoint, request) = serve_once("200 OK", b"").await;
        let gcs = handler(&endpoint, None);

        gcs.open(&Locator::parse("gs://public/model.bin")).await.unwrap();

        let head = request.await.unwrap();
        assert!(!head.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_open_maps_not_found() {
        let (endpoint, _request) = serve_once("404 Not Found", b"No such object").await;
        let gcs = handler(&endpoint, None);

        match gcs.open(&Locator::parse("gs://models/missing.pb")).await {
            Err(Error::ResourceNotFound { locator }) => {
                assert_eq!(locator, "gs://models/missing.pb")
            }
            Err(other) => panic!("expected ResourceNotFound, got {other:?}"),
            Ok(_) => panic!("expected ResourceNotFound, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_open_maps_server_errors_to_io() {
        let (endpoint, _request) = serve_once("500 Internal Server Error", b"backend").await;
        let gcs = handler(&endpoint, None);

        match gcs.open(&Locator::parse("gs://models/graph.pb")).await {
            Err(Error::Io { locator, source }) => {
                assert_eq!(locator, "gs://models/graph.pb");
                assert!(source.to_string().contains("500"));
            }
            Err(other) => panic!("expected Io, got {other:?}"),
            Ok(_) => panic!("expected Io, got a stream"),
        }
    }
}
