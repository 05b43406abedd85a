//! Resources packaged with the running process

use crate::error::{Error, Result};
use crate::resolver::{ByteStream, Locator, SchemeHandler};
use async_trait::async_trait;
use bytes::Bytes;
use rust_embed::{Embed, EmbeddedFile};
use std::collections::HashMap;
use std::io::Cursor;

type EmbedLookup = fn(&str) -> Option<EmbeddedFile>;

/// Serves `resource:` locators from in-memory entries and embedded asset
/// folders. Explicit entries take precedence over embedded files.
#[derive(Debug, Clone, Default)]
pub struct BundledResources {
    entries: HashMap<String, Bytes>,
    embeds: Vec<EmbedLookup>,
}

impl BundledResources {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an in-memory resource
    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.entries
            .insert(name.into().trim_start_matches('/').to_string(), data.into());
        self
    }

    /// Serve files from a `rust-embed` asset folder
    pub fn with_embed<E: Embed>(mut self) -> Self {
        self.embeds.push(<E as Embed>::get);
        self
    }

    /// Resource name for a locator (`resource:///a/b` and `resource:a/b` both map to `a/b`)
    pub fn name_of(locator: &Locator) -> &str {
        locator.rest().trim_start_matches('/')
    }

    fn lookup(&self, name: &str) -> Option<Bytes> {
        if let Some(data) = self.entries.get(name) {
            return Some(data.clone());
        }

        self.embeds
            .iter()
            .find_map(|get| get(name))
            .map(|file| Bytes::from(file.data.into_owned()))
    }
}

#[async_trait]
impl SchemeHandler for BundledResources {
    fn name(&self) -> &str {
        "bundled"
    }

    async fn open(&self, locator: &Locator) -> Result<ByteStream> {
        let name = Self::name_of(locator);
        match self.lookup(name) {
            Some(data) => Ok(Box::pin(Cursor::new(data))),
            None => Err(Error::not_found(locator.as_str())),
        }
    }
}
