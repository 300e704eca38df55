//! Error types for asset-tagger
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (decomposition, task execution, config)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::{BatchWarning, FailureKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for asset-tagger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for asset-tagger
///
/// This is the primary error type used throughout the library. Decomposition
/// and task failures have their own enums ([`DecomposeError`], [`TaskError`])
/// because they are contained at the file/task boundary instead of
/// propagating; this enum covers everything that aborts an operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.max_concurrent_tasks")
        key: Option<String>,
    },

    /// Upload contained no files
    #[error("empty batch: no files uploaded")]
    EmptyBatch,

    /// Upload exceeded the configured per-batch file limit
    #[error("upload limit exceeded: max is {limit} files, got {count}")]
    TooManyFiles {
        /// Configured maximum number of files per batch
        limit: usize,
        /// Number of files actually uploaded
        count: usize,
    },

    /// Every uploaded file was rejected during decomposition
    #[error("no analyzable assets: every uploaded file was rejected")]
    NoTasks,

    /// Batch not found
    #[error("batch not found: {0}")]
    NotFound(String),

    /// Export rows requested before the batch completed
    #[error("batch {id} is not completed: {settled}/{total} tasks settled")]
    BatchNotCompleted {
        /// The batch that is still running
        id: String,
        /// Tasks settled so far
        settled: usize,
        /// Total tasks in the batch
        total: usize,
    },

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// External tool execution failed (soffice)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented)
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// A whole uploaded file rejected during decomposition.
///
/// These never abort the batch; each becomes a [`BatchWarning`] and the
/// remaining files proceed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecomposeError {
    /// The file's extension is not in the accepted set
    #[error("unsupported file type: {file} ({extension})")]
    UnsupportedFileType {
        /// The rejected filename
        file: String,
        /// The offending extension (lowercased, without dot)
        extension: String,
    },

    /// The document conversion collaborator failed for this file
    #[error("conversion failed for {file}: {reason}")]
    ConversionFailed {
        /// The rejected filename
        file: String,
        /// Why conversion failed
        reason: String,
    },

    /// An accepted extension whose bytes did not decode as an image
    #[error("invalid image {file}: {reason}")]
    InvalidImage {
        /// The rejected filename
        file: String,
        /// Why decoding failed
        reason: String,
    },
}

impl DecomposeError {
    /// Machine-readable rejection code
    pub fn code(&self) -> &'static str {
        match self {
            DecomposeError::UnsupportedFileType { .. } => "unsupported_file_type",
            DecomposeError::ConversionFailed { .. } => "conversion_failed",
            DecomposeError::InvalidImage { .. } => "invalid_image",
        }
    }

    /// The rejected filename
    pub fn file(&self) -> &str {
        match self {
            DecomposeError::UnsupportedFileType { file, .. }
            | DecomposeError::ConversionFailed { file, .. }
            | DecomposeError::InvalidImage { file, .. } => file,
        }
    }
}

impl From<DecomposeError> for BatchWarning {
    fn from(err: DecomposeError) -> Self {
        BatchWarning {
            file: err.file().to_string(),
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }
}

/// A single task's failure, contained at the worker boundary.
///
/// Never propagates past the worker; every variant is converted into a
/// failed [`crate::types::TaskResult`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// Network/timeout failure talking to the metadata service
    #[error("transport error: {0}")]
    Transport(String),

    /// The metadata service returned a non-success status
    #[error("service error (status {status}): {message}")]
    Service {
        /// HTTP status returned by the service
        status: u16,
        /// Service-supplied error message, if any
        message: String,
    },

    /// The response body did not match the expected two-line contract
    #[error("parse error: response did not match the two-line metadata contract")]
    Parse {
        /// The raw response text, kept for diagnosis
        raw: String,
    },
}

impl TaskError {
    /// Failure classification carried into the task result
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Transport(_) => FailureKind::Transport,
            TaskError::Service { .. } => FailureKind::Service,
            TaskError::Parse { .. } => FailureKind::Parse,
        }
    }

    /// True for rate-limit/overload signals from the service
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TaskError::Service { status, .. } if *status == 429 || *status == 503)
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::Transport(err.to_string())
    }
}

/// API error response format
///
/// Returned by API endpoints when an error occurs: a machine-readable code,
/// a human-readable message, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "too_many_files",
///     "message": "upload limit exceeded: max is 100 files, got 120",
///     "details": { "limit": 100, "count": 120 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::EmptyBatch => 400,
            Error::TooManyFiles { .. } => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - Resource not in the required state
            Error::BatchNotCompleted { .. } => 409,

            // 422 Unprocessable Entity - Semantic errors
            Error::NoTasks => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,

            // 501 Not Implemented - Feature not supported
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::EmptyBatch => "empty_batch",
            Error::TooManyFiles { .. } => "too_many_files",
            Error::NoTasks => "no_tasks",
            Error::NotFound(_) => "not_found",
            Error::BatchNotCompleted { .. } => "batch_not_completed",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::TooManyFiles { limit, count } => Some(serde_json::json!({
                "limit": limit,
                "count": count,
            })),
            Error::BatchNotCompleted { id, settled, total } => Some(serde_json::json!({
                "batch_id": id,
                "settled": settled,
                "total": total,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
