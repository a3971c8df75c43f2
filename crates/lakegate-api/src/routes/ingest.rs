//! The archive upload route.
//!
//! ## Log Redaction Policy
//!
//! Secret values resolved during the workflow MUST NOT appear in logs or
//! response bodies. Only safe metadata is logged: filename, member count,
//! request ID, outcome code.
//!
//! ## Routes
//!
//! - `POST /api` - Upload an archive and dispatch the training job

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::Instrument;
use utoipa::ToSchema;

use lakegate_core::ingest_span;
use lakegate_ingest::{IngestError, UploadRequest};

use crate::context::RequestContext;
use crate::error::{ApiError, ApiErrorBody, ApiResult};
use crate::server::AppState;

/// Name of the multipart field carrying the archive.
const FILE_FIELD: &str = "file";

/// Success response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Always `"success"`.
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// Number of archive members staged.
    pub staged: usize,
    /// Service-assigned id of the completed batch job.
    pub job_id: String,
    /// Request ID for correlation.
    pub request_id: String,
}

/// Creates ingest routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api", post(ingest))
}

/// Upload a data archive and run the training job.
///
/// POST /api
///
/// Accepts a multipart form with a `file` field holding a ZIP archive of
/// tabular data files. Members are staged to the data lake, then the
/// model-training batch job is submitted and awaited.
#[utoipa::path(
    post,
    path = "/api",
    tag = "ingest",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Archive staged and job completed", body = IngestResponse),
        (status = 400, description = "Empty upload or malformed archive", body = ApiErrorBody),
        (status = 422, description = "Disallowed archive member type", body = ApiErrorBody),
        (status = 502, description = "A collaborating service failed", body = ApiErrorBody),
        (status = 504, description = "Job did not finish within the wait bound", body = ApiErrorBody),
    )
)]
pub(crate) async fn ingest(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let upload = extract_upload(multipart)
        .await
        .map_err(|e| e.with_request_id(ctx.request_id.clone()))?;

    tracing::info!(
        request_id = %ctx.request_id,
        filename = %upload.filename,
        size = upload.bytes.len(),
        "Ingest request received"
    );

    let span = ingest_span("ingest", &ctx.request_id);
    let result = state.workflow().run(upload).instrument(span).await;

    match result {
        Ok(report) => {
            crate::metrics::record_ingest_outcome("SUCCESS");
            crate::metrics::record_members_staged(report.staged);
            tracing::info!(
                request_id = %ctx.request_id,
                staged = report.staged,
                job_id = %report.job_id,
                "Ingest request completed"
            );
            Ok(Json(IngestResponse {
                status: "success".to_string(),
                message: format!(
                    "staged {} archive member(s) and completed job {}",
                    report.staged, report.job_id
                ),
                staged: report.staged,
                job_id: report.job_id,
                request_id: ctx.request_id,
            }))
        }
        Err(err) => {
            crate::metrics::record_ingest_outcome(err.code());
            tracing::warn!(
                request_id = %ctx.request_id,
                code = err.code(),
                step = err.step(),
                error = %err,
                "Ingest request failed"
            );
            Err(ApiError::from(err).with_request_id(ctx.request_id))
        }
    }
}

/// Pulls the `file` field out of the multipart form.
///
/// A missing field, like an empty one, is an empty upload; anything the
/// multipart parser itself rejects (bad framing, body over the limit) is a
/// bad request.
async fn extract_upload(mut multipart: Multipart) -> Result<UploadRequest, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        return Ok(UploadRequest { filename, bytes });
    }
    Err(ApiError::from(IngestError::EmptyUpload))
}
