//! Core batch pipeline implementation split into focused submodules.
//!
//! The `AssetPipeline` struct and its methods are organized by domain:
//! - [`decompose`] - Uploaded files -> ordered task list
//! - [`coordinator`] - Batch fan-out/fan-in under the concurrency cap
//! - [`worker`] - Single-task execution against the metadata service
//! - [`batches`] - Batch registry operations (submit/progress/rows/cancel)

pub(crate) mod batches;
pub(crate) mod coordinator;
pub(crate) mod decompose;
pub(crate) mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::convert::{SlideConverter, converter_from_config};
use crate::error::Result;
use crate::types::{BatchId, BatchProgress, BatchState, BatchWarning, Event, TaskResult};
use crate::vision::{MetadataGenerator, OpenAiVision};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Index-addressed result storage for one batch.
///
/// Pre-allocated to the task count; each worker writes only its own slot, so
/// no lock guards the collection. The settled counter is the single piece of
/// state touched by every worker.
pub(crate) struct ResultSlots {
    slots: Vec<OnceLock<TaskResult>>,
    settled: AtomicUsize,
}

impl ResultSlots {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            slots: (0..total).map(|_| OnceLock::new()).collect(),
            settled: AtomicUsize::new(0),
        }
    }

    /// Record a result in its slot. Returns false if the index is out of
    /// range or the slot was already written (both indicate a bug upstream;
    /// the first write always wins).
    pub(crate) fn record(&self, result: TaskResult) -> bool {
        let Some(slot) = self.slots.get(result.index) else {
            return false;
        };
        if slot.set(result).is_ok() {
            self.settled.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.settled() == self.total()
    }

    /// (ok, failed) counts over the slots written so far
    pub(crate) fn counts(&self) -> (usize, usize) {
        let mut ok = 0;
        let mut failed = 0;
        for slot in &self.slots {
            if let Some(result) = slot.get() {
                if result.outcome.is_ok() {
                    ok += 1;
                } else {
                    failed += 1;
                }
            }
        }
        (ok, failed)
    }

    /// The full result list in task-index order, once every slot is written
    pub(crate) fn ordered_results(&self) -> Option<Vec<TaskResult>> {
        let results: Vec<TaskResult> = self
            .slots
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .collect();
        if results.len() == self.total() {
            Some(results)
        } else {
            None
        }
    }
}

/// One live batch in the registry
pub(crate) struct BatchEntry {
    pub(crate) state: Arc<AtomicU8>,
    pub(crate) slots: Arc<ResultSlots>,
    pub(crate) warnings: Vec<BatchWarning>,
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
}

impl BatchEntry {
    pub(crate) fn progress(&self, id: &BatchId) -> BatchProgress {
        let (ok_tasks, failed_tasks) = self.slots.counts();
        BatchProgress {
            id: id.clone(),
            state: BatchState::from_u8(self.state.load(Ordering::SeqCst)),
            total_tasks: self.slots.total(),
            settled_tasks: self.slots.settled(),
            ok_tasks,
            failed_tasks,
            warnings: self.warnings.clone(),
            created_at: self.created_at,
        }
    }
}

/// Main pipeline instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct AssetPipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Metadata-generation collaborator
    pub(crate) generator: Arc<dyn MetadataGenerator>,
    /// Document conversion collaborator
    pub(crate) converter: Arc<dyn SlideConverter>,
    /// Concurrency limiter shared by every batch (at most N tasks in flight)
    pub(crate) limiter: Arc<tokio::sync::Semaphore>,
    /// Live batch registry
    pub(crate) batches: Arc<tokio::sync::Mutex<HashMap<BatchId, BatchEntry>>>,
    /// Flag to indicate whether new batches are accepted (cleared during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl AssetPipeline {
    /// Create a new AssetPipeline instance with production collaborators.
    ///
    /// Validates the configuration, builds the OpenAI-compatible vision
    /// client, and resolves the LibreOffice converter (explicit path, PATH
    /// search, or unavailable fallback).
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let generator: Arc<dyn MetadataGenerator> =
            Arc::new(OpenAiVision::new(config.vision.clone())?);
        let converter = converter_from_config(&config.converter);

        tracing::info!(
            converter = converter.name(),
            converter_available = converter.available(),
            max_concurrent_tasks = config.pipeline.max_concurrent_tasks,
            "pipeline initialized"
        );

        Ok(Self::with_collaborators(config, generator, converter))
    }

    /// Create a pipeline with explicit collaborators.
    ///
    /// This is the seam used by tests and by embedders that bring their own
    /// conversion or metadata backends.
    pub fn with_collaborators(
        config: Config,
        generator: Arc<dyn MetadataGenerator>,
        converter: Arc<dyn SlideConverter>,
    ) -> Self {
        // Buffer sized for bursty settlement of large batches
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1024);

        let limiter = Arc::new(tokio::sync::Semaphore::new(
            config.pipeline.max_concurrent_tasks,
        ));

        Self {
            config: Arc::new(config),
            event_tx,
            generator,
            converter,
            limiter,
            batches: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Subscribe to pipeline events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind the channel buffer
    /// receives a `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether presentation uploads can currently be converted
    pub fn converter_available(&self) -> bool {
        self.converter.available()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// batch processing never depends on listeners.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Stop accepting new batches and cancel admission of queued tasks.
    ///
    /// In-flight metadata calls are allowed to finish (their spend is
    /// already committed); no new tasks are admitted afterwards.
    pub async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);
        self.limiter.close();
        self.emit_event(Event::Shutdown);
        tracing::info!("pipeline shutdown initiated");
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server runs concurrently with batch processing and listens on the
    /// configured bind address (default: 127.0.0.1:7890).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let pipeline = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(pipeline, config).await })
    }
}
