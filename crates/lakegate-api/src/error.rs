//! API error types and HTTP response mapping.

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use lakegate_ingest::IngestError;

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Standard JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    /// Always `"error"`.
    pub status: String,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message (safe for clients, never contains secrets).
    pub message: String,
    /// Optional request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// HTTP API error with stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    /// Attaches a request ID for correlation.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id;
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                status: "error".to_string(),
                code: self.code.to_string(),
                message: self.message,
                request_id: request_id.clone(),
            }),
        )
            .into_response();

        if let Some(request_id) = request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), value);
            }
        }

        response
    }
}

impl From<IngestError> for ApiError {
    fn from(value: IngestError) -> Self {
        let status = match &value {
            IngestError::EmptyUpload | IngestError::MalformedArchive { .. } => {
                StatusCode::BAD_REQUEST
            }
            IngestError::DisallowedMemberType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::SecretNotFound { .. }
            | IngestError::SecretStoreUnavailable { .. }
            | IngestError::UploadFailed { .. }
            | IngestError::JobSubmissionFailed { .. }
            | IngestError::JobExecutionFailed { .. } => StatusCode::BAD_GATEWAY,
            IngestError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        };
        Self {
            status,
            code: value.code(),
            message: value.to_string(),
            request_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_faults_map_to_4xx() {
        let err = ApiError::from(IngestError::EmptyUpload);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "EMPTY_UPLOAD");

        let err = ApiError::from(IngestError::DisallowedMemberType {
            member: "a.exe".to_string(),
            allowed: "csv, json".to_string(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn collaborator_faults_map_to_502() {
        for err in [
            IngestError::SecretNotFound {
                name: "model-id".to_string(),
            },
            IngestError::SecretStoreUnavailable {
                message: "connection refused".to_string(),
            },
            IngestError::UploadFailed {
                member: "a.csv".to_string(),
                message: "quota".to_string(),
            },
            IngestError::JobSubmissionFailed {
                message: "bad pool".to_string(),
            },
            IngestError::JobExecutionFailed {
                message: "dead".to_string(),
            },
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::BAD_GATEWAY);
        }
    }

    #[test]
    fn timeout_maps_to_504() {
        let err = ApiError::from(IngestError::Timeout { seconds: 1800 });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[test]
    fn response_carries_request_id_header() {
        let err = ApiError::bad_request("bad").with_request_id("req-1");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            &HeaderValue::from_static("req-1")
        );
    }
}
