//! Error types for modelserve

use std::sync::Arc;
use std::time::Duration;

/// Result type alias using modelserve's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for modelserve operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The locator's scheme has no registered handler
    #[error("unsupported scheme '{scheme}' in locator '{locator}'")]
    UnsupportedScheme { scheme: String, locator: String },

    /// The handler could not find the resource
    #[error("resource not found: {locator}")]
    ResourceNotFound { locator: String },

    /// The handler failed while fetching the resource
    #[error("io error reading '{locator}': {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The artifact could not be turned into a model
    #[error("model parse error: {0}")]
    ModelParse(String),

    /// Feature-extraction settings failed to compile
    #[error("settings compilation failed: {message}")]
    SettingsCompilation {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// A per-item extraction failure escalated to the batch
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The inference function failed for the batch
    #[error("inference failed: {message}")]
    Inference {
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// The readiness wait exceeded its timeout
    #[error("model not ready after {timeout:?}")]
    ModelNotReady { timeout: Duration },

    /// The model load terminally failed; the failure is cached
    #[error("model unavailable: {cause}")]
    ModelUnavailable {
        #[source]
        cause: Arc<Error>,
    },

    /// The model or its loader has been released
    #[error("model has been released")]
    Released,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an io error for the given locator
    pub fn io(locator: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            locator: locator.into(),
            source,
        }
    }

    /// Create a not-found error for the given locator
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            locator: locator.into(),
        }
    }

    /// Create a new model parse error
    pub fn model_parse(msg: impl Into<String>) -> Self {
        Self::ModelParse(msg.into())
    }

    /// Create a new settings compilation error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::SettingsCompilation {
            message: msg.into(),
            source: None,
        }
    }

    /// Settings compilation error caused by another failure
    pub fn settings_caused_by(msg: impl Into<String>, cause: Error) -> Self {
        Self::SettingsCompilation {
            message: msg.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference {
            message: msg.into(),
            source: None,
        }
    }

    /// Inference error caused by another failure
    pub fn inference_caused_by(msg: impl Into<String>, cause: Error) -> Self {
        Self::Inference {
            message: msg.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedScheme { .. } => "unsupported_scheme",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::Io { .. } => "io",
            Self::ModelParse(_) => "model_parse",
            Self::SettingsCompilation { .. } => "settings_compilation",
            Self::Extraction(_) => "extraction",
            Self::Inference { .. } => "inference",
            Self::ModelNotReady { .. } => "model_not_ready",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Released => "released",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether retrying the same call later may succeed without a reload
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ModelNotReady { .. })
    }

    /// The load failure behind a `ModelUnavailable`, if any
    pub fn unavailable_cause(&self) -> Option<&Error> {
        match self {
            Self::ModelUnavailable { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Per-item feature extraction failure.
///
/// These are absorbed by the extraction adapter and only reach callers through
/// metrics, detailed prediction outcomes, or the `Fail` policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("missing feature '{0}'")]
    MissingFeature(String),

    #[error("unknown category '{value}' for feature '{feature}'")]
    UnknownCategory { feature: String, value: String },

    #[error("invalid value for feature '{feature}': {reason}")]
    InvalidValue { feature: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl ExtractionError {
    /// Create a free-form extraction error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
