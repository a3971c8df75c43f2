//! `OpenAPI` (3.1) specification generation for `lakegate-api`.
//!
//! The generated spec documents the upload endpoint and its error envelope
//! for external clients.

use utoipa::OpenApi;

/// `OpenAPI` documentation for the lakegate REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lakegate API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Archive ingestion and model-training job dispatch"
    ),
    paths(crate::routes::ingest::ingest),
    components(schemas(
        crate::error::ApiErrorBody,
        crate::routes::ingest::IngestResponse,
    )),
    tags(
        (name = "ingest", description = "Archive upload and job dispatch"),
    )
)]
pub struct ApiDoc;

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}
