//! modelserve Core
//!
//! Core types, traits, and utilities shared across modelserve components.
//!
//! This crate provides:
//! - The error taxonomy and result handling
//! - Shared pipeline types (extraction outcomes, feature vectors, predictions)
//! - Scheme-based resource resolution for model artifacts and settings

pub mod error;
pub mod resolver;
pub mod schemes;
pub mod types;

pub use error::{Error, ExtractionError, Result};
pub use resolver::{ByteStream, Locator, ResolverBuilder, ResourceResolver, SchemeHandler};
pub use schemes::{BundledResources, GcsConfig, GcsFileSystem, LocalFileSystem};
pub use types::{partition, Extracted, ExtractionFailure, FeatureVector, Prediction};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ExtractionError, Result};
    pub use crate::resolver::{ResourceResolver, SchemeHandler};
    pub use crate::types::{Extracted, FeatureVector, Prediction};
}
