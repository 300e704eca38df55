//! # asset-tagger
//!
//! Backend library for batch metadata generation over visual asset libraries.
//!
//! Uploaded assets (standalone images and multi-slide presentation files)
//! are decomposed into a flat list of independent analysis tasks, dispatched
//! against an external vision service under a bounded concurrency cap, and
//! reassembled — in strict input order, with per-task failure markers — into
//! an exportable table.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Failure-isolating** - No single asset's failure aborts its batch
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use asset_tagger::{AssetPipeline, Config, UploadedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.vision.api_key = "sk-...".to_string();
//!
//!     let pipeline = Arc::new(AssetPipeline::new(config)?);
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Submit a batch
//!     let submission = pipeline
//!         .submit_batch(
//!             vec![UploadedFile {
//!                 name: "logo.png".to_string(),
//!                 bytes: std::fs::read("logo.png")?,
//!             }],
//!             None,
//!         )
//!         .await?;
//!     println!("batch {} with {} tasks", submission.batch_id, submission.total_tasks);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Document conversion collaborator (presentations -> slide images)
pub mod convert;
/// Duplicate asset-name disambiguation
pub mod dedup;
/// Error types
pub mod error;
/// Export assembler input (ordered rows)
pub mod export;
/// Image payload preparation (decode, bound, re-encode)
pub mod imageprep;
/// Fixed-format metadata response parsing
pub mod parse;
/// Core batch pipeline (decomposition, dispatch, aggregation)
pub mod pipeline;
/// Retry logic for transient failures
pub mod retry;
/// Core types and events
pub mod types;
/// Metadata-generation collaborator (vision service client)
pub mod vision;

// Re-export commonly used types
pub use config::Config;
pub use convert::{CliSlideConverter, SlideConverter, SlideImage, UnavailableConverter};
pub use error::{
    ApiError, DecomposeError, Error, ErrorDetail, Result, TaskError, ToHttpStatus,
};
pub use export::{EXPORT_HEADERS, ExportRow, assemble_rows};
pub use pipeline::AssetPipeline;
pub use types::{
    BatchId, BatchProgress, BatchState, BatchSubmission, BatchWarning, Event, FailureKind,
    PayloadFormat, PreparedImage, Task, TaskOutcome, TaskResult, UploadedFile,
};
pub use vision::{MetadataGenerator, OpenAiVision};

/// Helper function to run the pipeline with graceful signal handling.
///
/// Waits for a termination signal (SIGTERM/SIGINT on Unix, Ctrl+C
/// elsewhere), then calls [`AssetPipeline::shutdown`]: new batches are
/// refused and queued tasks stop being admitted, while in-flight metadata
/// calls are allowed to finish.
pub async fn run_with_shutdown(pipeline: AssetPipeline) {
    wait_for_signal().await;
    pipeline.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT (Ctrl+C)"),
            }
        }
        // Signal registration can fail in restricted environments; fall back
        // to the portable Ctrl+C handler
        _ => {
            tracing::warn!("could not register unix signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
