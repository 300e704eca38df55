//! API route handlers organized by domain.

mod batches;
mod system;

pub use batches::{batch_rows, cancel_batch, get_batch, list_batches, submit_batch};
pub use system::{event_stream, get_capabilities, health_check, openapi_spec};

// Re-export the path item structs generated by `#[utoipa::path]` so the
// `OpenApi` derive in `openapi.rs` can resolve them via `crate::api::routes::*`.
#[allow(unused_imports)]
pub use batches::{
    __path_batch_rows, __path_cancel_batch, __path_get_batch, __path_list_batches,
    __path_submit_batch,
};
#[allow(unused_imports)]
pub use system::{
    __path_event_stream, __path_get_capabilities, __path_health_check, __path_openapi_spec,
};
