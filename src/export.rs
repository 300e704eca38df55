//! Export assembler input
//!
//! The tabular exporter is an external collaborator; this module owns the
//! contract it consumes: one row per task, in original input order, fully
//! resolved, with failed tasks carrying an explicit error marker instead of
//! blank or fabricated metadata. Duplicate-name suffixes are applied here so
//! every consumer sees the same disambiguated names.

use crate::dedup::apply_duplicate_suffixes;
use crate::types::{TaskOutcome, TaskResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Column headers for the exported table, in row-field order
pub const EXPORT_HEADERS: &[&str] = &[
    "Uploaded file name",
    "Asset name (English)",
    "Asset name (Arabic)",
    "Tags",
    "Error",
];

/// One row of the exportable table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExportRow {
    /// Display identity of the originating unit ("deck.pptx (slide 3)")
    pub uploaded: String,
    /// English asset name (empty for failed tasks)
    pub english_name: String,
    /// Arabic asset name (empty for failed tasks)
    pub arabic_name: String,
    /// Comma-joined tag list (empty for failed tasks)
    pub tags: String,
    /// Error marker for failed tasks, None for successful ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Assemble the exportable table from a completed batch's ordered results.
///
/// Input order is the results' order; callers pass the index-ordered list
/// the coordinator produced.
pub fn assemble_rows(results: &[TaskResult]) -> Vec<ExportRow> {
    let mut results = results.to_vec();
    apply_duplicate_suffixes(&mut results);

    results
        .into_iter()
        .map(|result| match result.outcome {
            TaskOutcome::Ok {
                english_name,
                arabic_name,
                tags,
            } => ExportRow {
                uploaded: result.uploaded,
                english_name,
                arabic_name,
                tags: tags.join(", "),
                error: None,
            },
            TaskOutcome::Failed { kind, message } => ExportRow {
                uploaded: result.uploaded,
                english_name: String::new(),
                arabic_name: String::new(),
                tags: String::new(),
                error: Some(format!("Error ({kind}): {message}")),
            },
        })
        .collect()
}
