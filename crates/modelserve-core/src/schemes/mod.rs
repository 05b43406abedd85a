//! Built-in scheme handlers
//!
//! - `local`: bare paths and `file://` URLs
//! - `gcs`: Google Cloud Storage objects (`gs://bucket/object`)
//! - `bundled`: resources packaged with the running process

mod bundled;
mod gcs;
mod local;

pub use bundled::BundledResources;
pub use gcs::{GcsConfig, GcsFileSystem};
pub use local::LocalFileSystem;
