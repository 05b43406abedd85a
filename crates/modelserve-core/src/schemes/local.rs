//! Local filesystem handler

use crate::error::{Error, Result};
use crate::resolver::{ByteStream, Locator, SchemeHandler};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use url::Url;

/// Opens bare paths and `file://` URLs from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Create a new local filesystem handler
    pub fn new() -> Self {
        Self
    }

    /// Resolve a locator to a filesystem path
    pub fn path_of(&self, locator: &Locator) -> Result<PathBuf> {
        if locator.scheme().is_empty() {
            return Ok(PathBuf::from(locator.as_str()));
        }

        let url = Url::parse(locator.as_str()).map_err(|e| {
            Error::io(
                locator.as_str(),
                std::io::Error::new(ErrorKind::InvalidInput, e),
            )
        })?;

        url.to_file_path().map_err(|_| {
            Error::io(
                locator.as_str(),
                std::io::Error::new(ErrorKind::InvalidInput, "not an absolute file URL"),
            )
        })
    }
}

#[async_trait]
impl SchemeHandler for LocalFileSystem {
    fn name(&self) -> &str {
        "local"
    }

    async fn open(&self, locator: &Locator) -> Result<ByteStream> {
        let path = self.path_of(locator)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found(locator.as_str())),
            Err(e) => Err(Error::io(locator.as_str(), e)),
        }
    }
}
