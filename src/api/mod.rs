//! REST API server module
//!
//! Thin HTTP surface over the pipeline: multipart batch upload, progress
//! queries, export-row retrieval, cancellation, and an SSE event stream,
//! documented via OpenAPI.

use crate::pipeline::AssetPipeline;
use crate::{Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Batches
/// - `POST /batches` - Upload files and start a batch
/// - `GET /batches` - Progress summaries for all live batches
/// - `GET /batches/:id` - Progress snapshot
/// - `GET /batches/:id/rows` - Ordered export rows (409 until completed)
/// - `DELETE /batches/:id` - Cancel and remove
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /capabilities` - Converter availability and configured limits
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(pipeline: Arc<AssetPipeline>, config: Arc<Config>) -> Router {
    let state = AppState::new(pipeline, config.clone());

    let router = Router::new()
        // Batches
        .route("/batches", post(routes::submit_batch))
        .route("/batches", get(routes::list_batches))
        .route("/batches/:id", get(routes::get_batch))
        .route("/batches/:id", delete(routes::cancel_batch))
        .route("/batches/:id/rows", get(routes::batch_rows))
        // System
        .route("/health", get(routes::health_check))
        .route("/capabilities", get(routes::get_capabilities))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // Merge Swagger UI routes if enabled (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Origins containing "*" (or an empty list) allow any origin; otherwise
/// only the listed origins are allowed. All methods and headers pass.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Creates a TCP listener and serves the router until shutdown or error.
pub async fn start_api_server(pipeline: Arc<AssetPipeline>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "starting API server");

    let app = create_router(pipeline, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(|e| crate::Error::ApiServerError(format!("failed to bind {bind_address}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::Error::ApiServerError(format!("server error: {e}")))?;

    Ok(())
}
