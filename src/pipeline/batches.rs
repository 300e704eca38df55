//! Batch registry operations: submit, query, export, cancel.

use crate::error::{Error, Result};
use crate::export::{ExportRow, assemble_rows};
use crate::types::{BatchId, BatchProgress, BatchState, BatchSubmission, Event, UploadedFile};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use super::coordinator::{BatchContext, run_batch};
use super::decompose::decompose_files;
use super::{AssetPipeline, BatchEntry, ResultSlots};

impl AssetPipeline {
    /// Accept one upload batch: decompose, register, and start processing.
    ///
    /// Decomposition (including presentation conversion) happens before this
    /// returns, so the acknowledgement carries the final task count and any
    /// per-file rejections. Task execution continues in the background;
    /// progress is queryable via [`Self::batch_progress`].
    pub async fn submit_batch(
        &self,
        files: Vec<UploadedFile>,
        instructions_override: Option<&str>,
    ) -> Result<BatchSubmission> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if files.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let limit = self.config.pipeline.max_files_per_batch;
        if files.len() > limit {
            return Err(Error::TooManyFiles {
                limit,
                count: files.len(),
            });
        }

        let instructions: Arc<str> =
            Arc::from(self.config.vision.instructions(instructions_override));
        let (tasks, warnings) = decompose_files(
            &files,
            &instructions,
            self.converter.as_ref(),
            &self.config.image,
        )
        .await;

        if tasks.is_empty() {
            return Err(Error::NoTasks);
        }

        let id = BatchId::new();
        let total_tasks = tasks.len();

        let entry = BatchEntry {
            state: Arc::new(AtomicU8::new(BatchState::Pending.to_u8())),
            slots: Arc::new(ResultSlots::new(total_tasks)),
            warnings: warnings.clone(),
            cancel_token: tokio_util::sync::CancellationToken::new(),
            created_at: chrono::Utc::now(),
        };

        let ctx = BatchContext {
            id: id.clone(),
            tasks,
            state: Arc::clone(&entry.state),
            slots: Arc::clone(&entry.slots),
            cancel_token: entry.cancel_token.clone(),
            limiter: Arc::clone(&self.limiter),
            generator: Arc::clone(&self.generator),
            retry: self.config.pipeline.retry.clone(),
            event_tx: self.event_tx.clone(),
        };

        self.batches.lock().await.insert(id.clone(), entry);

        tracing::info!(
            batch_id = %id,
            total_tasks,
            rejected_files = warnings.len(),
            "batch submitted"
        );
        self.emit_event(Event::BatchSubmitted {
            id: id.clone(),
            total_tasks,
        });

        tokio::spawn(run_batch(ctx));

        Ok(BatchSubmission {
            batch_id: id,
            total_tasks,
            warnings,
        })
    }

    /// Progress snapshot for one batch, safe to call while it is running.
    pub async fn batch_progress(&self, id: &BatchId) -> Result<BatchProgress> {
        let batches = self.batches.lock().await;
        let entry = batches
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(entry.progress(id))
    }

    /// Progress snapshots for every live batch, newest first.
    pub async fn list_batches(&self) -> Vec<BatchProgress> {
        let batches = self.batches.lock().await;
        let mut progress: Vec<BatchProgress> = batches
            .iter()
            .map(|(id, entry)| entry.progress(id))
            .collect();
        progress.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        progress
    }

    /// Ordered export rows for a completed batch.
    ///
    /// Exactly one row per task, in original input order, failed tasks
    /// carrying their error marker. Returns `BatchNotCompleted` while
    /// results are still arriving.
    pub async fn export_rows(&self, id: &BatchId) -> Result<Vec<ExportRow>> {
        let batches = self.batches.lock().await;
        let entry = batches
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        match entry.slots.ordered_results() {
            Some(results) => Ok(assemble_rows(&results)),
            None => Err(Error::BatchNotCompleted {
                id: id.to_string(),
                settled: entry.slots.settled(),
                total: entry.slots.total(),
            }),
        }
    }

    /// Cancel a batch and remove it from the registry.
    ///
    /// No new tasks are admitted after this; in-flight metadata calls finish
    /// (their spend is committed) but the batch has no addressable home for
    /// partial results afterwards. Also the removal path for completed
    /// batches once their export has been consumed.
    pub async fn cancel_batch(&self, id: &BatchId) -> Result<()> {
        let entry = self
            .batches
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        entry.cancel_token.cancel();
        tracing::info!(batch_id = %id, "batch cancelled and removed");
        self.emit_event(Event::BatchCancelled { id: id.clone() });
        Ok(())
    }
}
