//! Batch coordinator — permit-gated fan-out, index-addressed fan-in.
//!
//! Admission follows task sequence order: the coordinator acquires an owned
//! semaphore permit before spawning each worker, so at most N tasks are in
//! flight against the metadata service and the (N+1)th task is admitted the
//! moment one settles. Completion order is unconstrained; output order is
//! restored by the index-addressed slots, not by arrival.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::config::RetryConfig;
use crate::types::{BatchId, BatchState, Event, FailureKind, Task, TaskOutcome, TaskResult};
use crate::vision::MetadataGenerator;

use super::ResultSlots;
use super::worker::run_task;

/// Everything one batch run needs, detached from the pipeline so the
/// coordinator task owns its state outright.
pub(crate) struct BatchContext {
    pub(crate) id: BatchId,
    pub(crate) tasks: Vec<Task>,
    pub(crate) state: Arc<AtomicU8>,
    pub(crate) slots: Arc<ResultSlots>,
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    pub(crate) limiter: Arc<tokio::sync::Semaphore>,
    pub(crate) generator: Arc<dyn MetadataGenerator>,
    pub(crate) retry: RetryConfig,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

/// Run one batch to completion (or cancellation).
///
/// Phases:
/// 1. Admit tasks in sequence order, one owned permit each
/// 2. Mark the batch Running once dispatch completes
/// 3. Await every worker; each wrote its own result slot
/// 4. Mark Completed and report counts
pub(crate) async fn run_batch(ctx: BatchContext) {
    let BatchContext {
        id,
        tasks,
        state,
        slots,
        cancel_token,
        limiter,
        generator,
        retry,
        event_tx,
    } = ctx;

    let total = tasks.len();
    let mut handles: Vec<(usize, String, tokio::task::JoinHandle<()>)> =
        Vec::with_capacity(total);
    let mut cancelled = false;

    for task in tasks {
        // Blocks while N tasks are in flight; admission order is task order.
        // Cancellation must win even mid-wait, or a permit freed after the
        // cancel would admit one more task.
        let permit = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::info!(batch_id = %id, "batch cancelled, stopping admission");
                None
            }
            permit = limiter.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            // Cancelled, or the limiter closed because the pipeline is
            // shutting down; either way no further admissions
            cancelled = true;
            break;
        };

        let index = task.index;
        let uploaded = task.display_name();
        let worker_slots = Arc::clone(&slots);
        let worker_generator = Arc::clone(&generator);
        let worker_retry = retry.clone();
        let worker_events = event_tx.clone();
        let worker_batch = id.clone();

        let handle = tokio::spawn(async move {
            // Permit is held for the worker's whole lifetime; releasing it
            // on drop admits the next queued task
            let _permit = permit;
            let result = run_task(&task, worker_generator.as_ref(), &worker_retry).await;
            let ok = result.outcome.is_ok();
            if worker_slots.record(result) {
                worker_events
                    .send(Event::TaskSettled {
                        id: worker_batch,
                        index,
                        ok,
                    })
                    .ok();
            }
        });
        handles.push((index, uploaded, handle));
    }

    if !cancelled {
        state.store(BatchState::Running.to_u8(), Ordering::SeqCst);
        tracing::debug!(batch_id = %id, total_tasks = total, "all tasks admitted");
    }

    for (index, uploaded, handle) in handles {
        if handle.await.is_err() {
            // Workers contain their own failures; a panic here is a bug, but
            // the one-result-per-task invariant must survive it
            tracing::error!(batch_id = %id, task_index = index, "task worker panicked");
            slots.record(TaskResult {
                index,
                uploaded,
                outcome: TaskOutcome::Failed {
                    kind: FailureKind::Transport,
                    message: "task worker panicked".to_string(),
                },
            });
        }
    }

    if cancelled {
        // The registry entry is already gone (cancel removed it); in-flight
        // results above were allowed to finish to avoid wasted spend
        tracing::info!(batch_id = %id, settled = slots.settled(), "cancelled batch drained");
        return;
    }

    state.store(BatchState::Completed.to_u8(), Ordering::SeqCst);
    let (ok_tasks, failed_tasks) = slots.counts();
    tracing::info!(
        batch_id = %id,
        ok_tasks,
        failed_tasks,
        "batch completed"
    );
    event_tx
        .send(Event::BatchCompleted {
            id,
            ok_tasks,
            failed_tasks,
        })
        .ok();
}
