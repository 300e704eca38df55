//! Batch management handlers.

use crate::api::AppState;
use crate::types::{BatchId, UploadedFile};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// POST /batches - Upload files and start a batch
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    tag = "batches",
    request_body(content = Vec<u8>, description = "Uploaded assets (multipart/form-data): repeated 'files' parts, optional 'prompt' part", content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Batch accepted", body = crate::types::BatchSubmission),
        (status = 400, description = "Empty upload or file limit exceeded"),
        (status = 422, description = "Every uploaded file was rejected"),
        (status = 503, description = "Shutting down"),
    )
)]
pub async fn submit_batch(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut prompt: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "files" | "file" => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "upload".to_string());
                match field.bytes().await {
                    Ok(bytes) => files.push(UploadedFile {
                        name: file_name,
                        bytes: bytes.to_vec(),
                    }),
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({"error": {"code": "invalid_file", "message": format!("Failed to read file: {}", e)}})),
                        )
                            .into_response();
                    }
                }
            }
            "prompt" => {
                if let Ok(bytes) = field.bytes().await {
                    if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                        prompt = Some(text);
                    }
                }
            }
            _ => {}
        }
    }

    match state.pipeline.submit_batch(files, prompt.as_deref()).await {
        Ok(submission) => (StatusCode::ACCEPTED, Json(submission)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /batches - Progress summaries for all live batches
#[utoipa::path(
    get,
    path = "/api/v1/batches",
    tag = "batches",
    responses(
        (status = 200, description = "Progress snapshots, newest first", body = Vec<crate::types::BatchProgress>)
    )
)]
pub async fn list_batches(State(state): State<AppState>) -> impl IntoResponse {
    let batches = state.pipeline.list_batches().await;
    (StatusCode::OK, Json(batches))
}

/// GET /batches/:id - Progress snapshot for one batch
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}",
    tag = "batches",
    params(
        ("id" = String, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch progress", body = crate::types::BatchProgress),
        (status = 404, description = "Batch not found"),
    )
)]
pub async fn get_batch(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.pipeline.batch_progress(&BatchId::from(id)).await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /batches/:id/rows - Ordered export rows for a completed batch
#[utoipa::path(
    get,
    path = "/api/v1/batches/{id}/rows",
    tag = "batches",
    params(
        ("id" = String, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "One row per task in input order", body = Vec<crate::export::ExportRow>),
        (status = 404, description = "Batch not found"),
        (status = 409, description = "Batch not completed yet"),
    )
)]
pub async fn batch_rows(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.pipeline.export_rows(&BatchId::from(id)).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /batches/:id - Cancel and remove a batch
#[utoipa::path(
    delete,
    path = "/api/v1/batches/{id}",
    tag = "batches",
    params(
        ("id" = String, Path, description = "Batch ID")
    ),
    responses(
        (status = 200, description = "Batch cancelled and removed"),
        (status = 404, description = "Batch not found"),
    )
)]
pub async fn cancel_batch(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.pipeline.cancel_batch(&BatchId::from(id)).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "cancelled"}))).into_response(),
        Err(e) => e.into_response(),
    }
}
