//! Task worker — one task in, exactly one result out.
//!
//! Every failure mode is converted into a failed `TaskResult` at this
//! boundary; nothing escapes. Transient transport/rate-limit failures get
//! the configured retry treatment before being reported.

use crate::config::RetryConfig;
use crate::parse::parse_metadata;
use crate::retry::call_with_retry;
use crate::types::{Task, TaskOutcome, TaskResult};
use crate::vision::MetadataGenerator;

/// Execute one task against the metadata service and settle its result.
pub(crate) async fn run_task(
    task: &Task,
    generator: &dyn MetadataGenerator,
    retry: &RetryConfig,
) -> TaskResult {
    let uploaded = task.display_name();

    let outcome = match call_with_retry(retry, || {
        generator.generate(&task.image, &task.instructions)
    })
    .await
    {
        Ok(raw) => match parse_metadata(&raw) {
            Ok(parsed) => TaskOutcome::Ok {
                english_name: parsed.english_name,
                arabic_name: parsed.arabic_name,
                tags: parsed.tags,
            },
            Err(err) => {
                tracing::warn!(
                    task_index = task.index,
                    uploaded = %uploaded,
                    error = %err,
                    "metadata response failed to parse"
                );
                TaskOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        },
        Err(err) => {
            tracing::warn!(
                task_index = task.index,
                uploaded = %uploaded,
                error = %err,
                "metadata generation failed"
            );
            TaskOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            }
        }
    };

    TaskResult {
        index: task.index,
        uploaded,
        outcome,
    }
}
