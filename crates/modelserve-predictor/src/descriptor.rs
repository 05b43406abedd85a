//! Model descriptors
//!
//! A descriptor names everything needed to build one model instance: the
//! artifact, optional feature settings, named auxiliary resources, and the
//! executor the load runs on. Two descriptors with the same key share a
//! single load.

use crate::executor::LoadExecutor;
use std::collections::BTreeMap;

/// Immutable description of a model to load
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    model_uri: String,
    settings_uri: Option<String>,
    auxiliary_uris: BTreeMap<String, String>,
    executor: Option<LoadExecutor>,
}

impl ModelDescriptor {
    /// Describe a model by its artifact locator
    pub fn new(model_uri: impl Into<String>) -> Self {
        Self {
            model_uri: model_uri.into(),
            settings_uri: None,
            auxiliary_uris: BTreeMap::new(),
            executor: None,
        }
    }

    /// Attach a feature-extraction settings locator
    pub fn with_settings(mut self, settings_uri: impl Into<String>) -> Self {
        self.settings_uri = Some(settings_uri.into());
        self
    }

    /// Attach a named auxiliary resource (vocabularies, label maps, ...)
    pub fn with_auxiliary(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.auxiliary_uris.insert(name.into(), uri.into());
        self
    }

    /// Run this model's load on a specific executor
    pub fn with_executor(mut self, executor: LoadExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    pub fn settings_uri(&self) -> Option<&str> {
        self.settings_uri.as_deref()
    }

    pub fn auxiliary_uris(&self) -> &BTreeMap<String, String> {
        &self.auxiliary_uris
    }

    pub fn executor(&self) -> Option<&LoadExecutor> {
        self.executor.as_ref()
    }

    /// Identity used to deduplicate loads
    pub fn key(&self) -> DescriptorKey {
        DescriptorKey {
            model_uri: self.model_uri.clone(),
            settings_uri: self.settings_uri.clone(),
            auxiliary_uris: self
                .auxiliary_uris
                .iter()
                .map(|(name, uri)| (name.clone(), uri.clone()))
                .collect(),
            executor: self.executor.as_ref().map(|e| e.name().to_string()),
        }
    }
}

/// Hashable identity of a [`ModelDescriptor`]
///
/// Executors are compared by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    model_uri: String,
    settings_uri: Option<String>,
    auxiliary_uris: Vec<(String, String)>,
    executor: Option<String>,
}

impl DescriptorKey {
    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }
}
