//! ShelfStore library -- S3-compatible object storage over the local
//! filesystem.
//!
//! This crate provides the pieces for running an S3-compatible storage
//! server: request handling, a file-backed object store with JSON
//! metadata sidecars, S3 XML rendering, and a static-website serving
//! mode (index document, error document, routing-rule redirects).

pub mod config;
pub mod errors;
pub mod fs;
pub mod handlers;
pub mod server;
pub mod store;
pub mod xml;

use crate::config::Config;
use crate::store::ObjectStore;

/// Shared application state passed to all handlers via
/// `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// The file-backed object store.
    pub store: ObjectStore,
}
