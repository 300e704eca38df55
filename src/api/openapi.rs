//! OpenAPI documentation and schema generation
//!
//! Compile-time OpenAPI specification for the asset-tagger REST API,
//! generated with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the asset-tagger REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "asset-tagger REST API",
        version = "0.2.0",
        description = "REST API for batch metadata generation over visual asset libraries",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:7890/api/v1", description = "Local development server")
    ),
    paths(
        // Batches
        crate::api::routes::submit_batch,
        crate::api::routes::list_batches,
        crate::api::routes::get_batch,
        crate::api::routes::batch_rows,
        crate::api::routes::cancel_batch,

        // System
        crate::api::routes::health_check,
        crate::api::routes::get_capabilities,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(
        schemas(
            crate::types::BatchId,
            crate::types::BatchState,
            crate::types::BatchProgress,
            crate::types::BatchSubmission,
            crate::types::BatchWarning,
            crate::types::TaskResult,
            crate::types::TaskOutcome,
            crate::types::FailureKind,
            crate::export::ExportRow,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "batches", description = "Batch upload, progress, export, and cancellation"),
        (name = "system", description = "Health, capabilities, and event streaming"),
    )
)]
pub struct ApiDoc;
