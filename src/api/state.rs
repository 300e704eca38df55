//! Application state for the API server

use crate::{Config, pipeline::AssetPipeline};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request (cheap Arc clones); provides access to the pipeline
/// instance and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The main AssetPipeline instance
    pub pipeline: Arc<AssetPipeline>,

    /// Configuration (read access; the pipeline owns runtime behavior)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(pipeline: Arc<AssetPipeline>, config: Arc<Config>) -> Self {
        Self { pipeline, config }
    }
}
