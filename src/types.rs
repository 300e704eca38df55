//! Core types for asset-tagger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Unique identifier for a batch
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Generate a fresh batch identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Batch lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// Tasks are still being admitted to the limiter
    Pending,
    /// All tasks admitted, results still arriving
    Running,
    /// Every task has a result
    Completed,
}

impl BatchState {
    /// Convert integer state code to BatchState
    pub fn from_u8(state: u8) -> Self {
        match state {
            0 => BatchState::Pending,
            1 => BatchState::Running,
            _ => BatchState::Completed,
        }
    }

    /// Convert BatchState to integer state code
    pub fn to_u8(&self) -> u8 {
        match self {
            BatchState::Pending => 0,
            BatchState::Running => 1,
            BatchState::Completed => 2,
        }
    }
}

/// Classification of a failed task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network-level failure talking to the metadata service
    Transport,
    /// The metadata service returned a non-success status
    Service,
    /// The response body did not match the two-line contract
    Parse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Service => write!(f, "service"),
            FailureKind::Parse => write!(f, "parse"),
        }
    }
}

/// Wire format of a prepared image payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadFormat {
    /// PNG (used for alpha-carrying and converted sources)
    Png,
    /// JPEG (opaque sources, re-encoded at configured quality)
    Jpeg,
}

impl PayloadFormat {
    /// MIME type for the data URL sent to the metadata service
    pub fn mime(&self) -> &'static str {
        match self {
            PayloadFormat::Png => "image/png",
            PayloadFormat::Jpeg => "image/jpeg",
        }
    }
}

/// An image payload ready for transport: decoded, bounded, re-encoded
#[derive(Clone, Debug)]
pub struct PreparedImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`
    pub format: PayloadFormat,
}

/// One unit of independent metadata-generation work.
///
/// Created once during decomposition and never mutated. The `index` field is
/// the task's stable position in the batch and defines output order.
#[derive(Clone, Debug)]
pub struct Task {
    /// Stable sequence index within the batch (defines output order)
    pub index: usize,
    /// Originating upload filename
    pub source_name: String,
    /// 1-based slide number for presentation-derived tasks, None for plain images
    pub slide: Option<u32>,
    /// Prepared image payload
    pub image: PreparedImage,
    /// Instruction text sent to the metadata service
    pub instructions: Arc<str>,
}

impl Task {
    /// Human-readable identity: "deck.pptx (slide 3)" or "logo.png"
    pub fn display_name(&self) -> String {
        match self.slide {
            Some(n) => format!("{} (slide {})", self.source_name, n),
            None => self.source_name.clone(),
        }
    }
}

/// Outcome of one task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Metadata was generated and parsed successfully
    Ok {
        /// Extracted English asset name
        english_name: String,
        /// Extracted Arabic asset name
        arabic_name: String,
        /// Parsed tag list
        tags: Vec<String>,
    },
    /// The task failed; the batch continues
    Failed {
        /// Failure classification
        kind: FailureKind,
        /// Human-readable failure message
        message: String,
    },
}

impl TaskOutcome {
    /// True if the task produced metadata
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskOutcome::Ok { .. })
    }
}

/// Result of one task, written exactly once into its batch slot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskResult {
    /// Back-reference to the task's sequence index
    pub index: usize,
    /// Display identity of the originating unit ("deck.pptx (slide 3)")
    pub uploaded: String,
    /// Success or typed failure
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

/// A file rejected during decomposition; the rest of the batch proceeded
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchWarning {
    /// The rejected upload's filename
    pub file: String,
    /// Machine-readable rejection code
    pub code: String,
    /// Human-readable rejection reason
    pub reason: String,
}

/// Point-in-time snapshot of a batch, safe to query while running
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchProgress {
    /// Batch identifier
    pub id: BatchId,
    /// Current lifecycle state
    pub state: BatchState,
    /// Total number of tasks decomposition produced
    pub total_tasks: usize,
    /// Number of tasks that have settled (ok or failed)
    pub settled_tasks: usize,
    /// Settled tasks that produced metadata
    pub ok_tasks: usize,
    /// Settled tasks that failed
    pub failed_tasks: usize,
    /// Files rejected during decomposition
    pub warnings: Vec<BatchWarning>,
    /// When the batch was submitted
    pub created_at: DateTime<Utc>,
}

/// Acknowledgement returned when a batch is accepted
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchSubmission {
    /// Identifier of the new batch
    pub batch_id: BatchId,
    /// Number of tasks decomposition produced
    pub total_tasks: usize,
    /// Files rejected during decomposition
    pub warnings: Vec<BatchWarning>,
}

/// An uploaded file as received from the transport layer
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Client-supplied filename (sanitized to its basename before use)
    pub name: String,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

/// Pipeline events broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was accepted and its tasks are being dispatched
    BatchSubmitted {
        /// Batch identifier
        id: BatchId,
        /// Task count after decomposition
        total_tasks: usize,
    },
    /// One task settled (ok or failed)
    TaskSettled {
        /// Batch identifier
        id: BatchId,
        /// Sequence index of the settled task
        index: usize,
        /// Whether the task produced metadata
        ok: bool,
    },
    /// Every task in the batch has a result
    BatchCompleted {
        /// Batch identifier
        id: BatchId,
        /// Count of successful tasks
        ok_tasks: usize,
        /// Count of failed tasks
        failed_tasks: usize,
    },
    /// The batch was cancelled and removed before completion
    BatchCancelled {
        /// Batch identifier
        id: BatchId,
    },
    /// The pipeline is shutting down
    Shutdown,
}
