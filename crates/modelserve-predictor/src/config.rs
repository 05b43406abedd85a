//! Model configuration

use crate::descriptor::ModelDescriptor;
use crate::executor::{default_threads, LoadExecutor};
use crate::predictor::{ExtractionFailurePolicy, PredictorOptions};
use modelserve_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for one served model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Artifact locator
    pub model_uri: String,

    /// Feature-extraction settings locator
    #[serde(default)]
    pub settings_uri: Option<String>,

    /// Named auxiliary resources handed to the model factory
    #[serde(default)]
    pub auxiliary_uris: BTreeMap<String, String>,

    /// How long predictions wait for the model to load
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Where the load runs
    #[serde(default)]
    pub executor: ExecutorKind,

    /// Worker threads for a dedicated executor (default: CPUs, at most 4)
    #[serde(default)]
    pub executor_threads: Option<usize>,

    #[serde(default)]
    pub extraction_failures: ExtractionFailurePolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    /// The loader's default executor
    #[default]
    Default,

    /// A runtime owned by this model
    Dedicated,
}

impl ModelConfig {
    /// Configuration for an artifact with every option at its default
    pub fn new(model_uri: impl Into<String>) -> Self {
        Self {
            model_uri: model_uri.into(),
            settings_uri: None,
            auxiliary_uris: BTreeMap::new(),
            load_timeout_ms: default_load_timeout_ms(),
            executor: ExecutorKind::Default,
            executor_threads: None,
            extraction_failures: ExtractionFailurePolicy::Drop,
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid model config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_uri.trim().is_empty() {
            return Err(Error::config("model_uri must not be empty"));
        }
        if self.executor_threads == Some(0) {
            return Err(Error::config("executor_threads must be at least 1"));
        }
        if self.executor_threads.is_some() && self.executor != ExecutorKind::Dedicated {
            tracing::warn!("executor_threads is ignored unless executor is 'dedicated'");
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    /// Build the model descriptor
    ///
    /// A dedicated executor is started here and named after the model.
    pub fn descriptor(&self) -> Result<ModelDescriptor> {
        let mut descriptor = ModelDescriptor::new(&self.model_uri);
        if let Some(settings_uri) = &self.settings_uri {
            descriptor = descriptor.with_settings(settings_uri);
        }
        for (name, uri) in &self.auxiliary_uris {
            descriptor = descriptor.with_auxiliary(name, uri);
        }

        if self.executor == ExecutorKind::Dedicated {
            let threads = self.executor_threads.unwrap_or_else(default_threads);
            let executor = LoadExecutor::dedicated(format!("model:{}", self.model_uri), threads)?;
            descriptor = descriptor.with_executor(executor);
        }

        Ok(descriptor)
    }
}

impl From<&ModelConfig> for PredictorOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
            extraction_failures: config.extraction_failures,
        }
    }
}

fn default_load_timeout_ms() -> u64 {
    10_000
}
