//! API server implementation.
//!
//! Provides the upload, health, ready, and metrics endpoints and wires the
//! three collaborator handles into the ingest workflow.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use lakegate_core::{
    BatchJobService, MemoryJobService, MemorySecretStore, MemoryStore, ObjectStore, Result,
    SecretStore,
};
use lakegate_ingest::IngestWorkflow;

use crate::config::Config;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Shared application state for all request handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    store: Arc<dyn ObjectStore>,
    workflow: IngestWorkflow,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &"<ObjectStore>")
            .field("workflow", &"<IngestWorkflow>")
            .finish()
    }
}

impl AppState {
    /// Creates application state over the given collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        jobs: Arc<dyn BatchJobService>,
    ) -> Self {
        let workflow = IngestWorkflow::new(
            Arc::clone(&store),
            secrets,
            jobs,
            config.workflow_config(),
        );
        Self {
            config,
            store,
            workflow,
        }
    }

    /// Returns the ingest workflow.
    #[must_use]
    pub fn workflow(&self) -> &IngestWorkflow {
        &self.workflow
    }

    /// Returns the object store handle.
    #[must_use]
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }
}

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check that
/// doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// A `head` on a missing key is sufficient to validate credentials and the
/// network path without listing the file system.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let check_key = "__lakegate/ready-check";
    match state.store.head(check_key).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("storage check failed: {e}")),
            }),
        ),
    }
}

/// The lakegate API server.
pub struct Server {
    config: Config,
    store: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    jobs: Arc<dyn BatchJobService>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("store", &"<ObjectStore>")
            .field("secrets", &"<SecretStore>")
            .field("jobs", &"<BatchJobService>")
            .finish()
    }
}

impl Server {
    /// Creates a server with in-memory collaborators (debug mode, tests).
    ///
    /// The in-memory secret store is seeded with placeholder values for the
    /// configured secret names so the workflow can complete locally.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let secrets = MemorySecretStore::new()
            .with_secret(config.secret_names.model_id.clone(), "debug-model-id")
            .with_secret(config.secret_names.api_key.clone(), "debug-api-key");
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            secrets: Arc::new(secrets),
            jobs: Arc::new(MemoryJobService::default()),
        }
    }

    /// Creates a server with explicit collaborators (production wiring).
    #[must_use]
    pub fn with_collaborators(
        config: Config,
        store: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        jobs: Arc<dyn BatchJobService>,
    ) -> Self {
        Self {
            config,
            store,
            secrets,
            jobs,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = Arc::new(AppState::new(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.secrets),
            Arc::clone(&self.jobs),
        ));

        Router::new()
            .route("/health", get(health))
            .route("/ready", get(ready))
            .route("/metrics", get(crate::metrics::serve_metrics))
            .merge(crate::routes::api_routes())
            // Middleware (order matters): request-id outermost so every
            // response carries the header, then metrics for timing, then
            // trace, then the body limit closest to the handlers.
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(crate::metrics::metrics_middleware))
            .layer(middleware::from_fn(crate::context::request_id_middleware))
            .with_state(state)
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the configured port.
    pub async fn serve(&self) -> Result<()> {
        crate::metrics::init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(http_port = self.config.http_port, "Starting lakegate API server");

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            lakegate_core::Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            }
        })?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| lakegate_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to exercise the
    /// routes without binding to a port.
    #[doc(hidden)]
    #[must_use]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install shutdown signal handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use axum::body::Body;
    use axum::http::{header, Request};
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use lakegate_core::JobScript;
    use serde_json::Value;
    use tower::ServiceExt;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    const BOUNDARY: &str = "lakegate-test-boundary";

    fn test_config() -> Config {
        let mut config = Config {
            debug: true,
            ..Config::default()
        };
        config.storage.directory = "staging/input".to_string();
        config.synapse.workspace_name = Some("ws-test".to_string());
        config
    }

    struct Harness {
        store: Arc<MemoryStore>,
        jobs: Arc<MemoryJobService>,
        router: Router,
    }

    fn harness(script: JobScript, with_secrets: bool) -> Harness {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let jobs = Arc::new(MemoryJobService::new(script));
        let secrets = if with_secrets {
            MemorySecretStore::new()
                .with_secret(config.secret_names.model_id.clone(), "m-42")
                .with_secret(config.secret_names.api_key.clone(), "k-7")
        } else {
            MemorySecretStore::new()
        };
        let server = Server::with_collaborators(
            config,
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::new(secrets),
            Arc::clone(&jobs) as Arc<dyn BatchJobService>,
        );
        Harness {
            store,
            jobs,
            router: server.test_router(),
        }
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(content).expect("write content");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    fn multipart_body(filename: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/zip\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(filename, content)))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let h = harness(JobScript::Succeed, true);
        let response = h
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn ready_reports_ready_with_reachable_store() {
        let h = harness(JobScript::Succeed, true);
        let response = h
            .router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ready"], true);
    }

    #[tokio::test]
    async fn upload_stages_members_and_reports_job() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("train.csv", b"a,b\n1,2\n"), ("eval.csv", b"a,b\n3,4\n")]);

        let response = h.router.oneshot(upload_request("data.zip", &zip)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["staged"], 2);
        assert_eq!(body["jobId"], "1");
        assert!(body["requestId"].as_str().is_some_and(|id| !id.is_empty()));

        assert!(h
            .store
            .head("staging/input/train.csv")
            .await
            .unwrap()
            .is_some());
        assert_eq!(h.jobs.submit_count(), 1);
    }

    #[tokio::test]
    async fn disallowed_member_returns_422_and_stages_nothing() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("good.csv", b"x"), ("payload.exe", b"MZ")]);

        let response = h.router.oneshot(upload_request("data.zip", &zip)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "DISALLOWED_MEMBER_TYPE");

        assert!(h.store.list("").await.unwrap().is_empty());
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_empty_upload() {
        let h = harness(JobScript::Succeed, true);
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "EMPTY_UPLOAD");
    }

    #[tokio::test]
    async fn empty_file_part_is_empty_upload() {
        let h = harness(JobScript::Succeed, true);
        let response = h
            .router
            .oneshot(upload_request("data.zip", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "EMPTY_UPLOAD");
    }

    #[tokio::test]
    async fn non_zip_upload_is_malformed() {
        let h = harness(JobScript::Succeed, true);
        let response = h
            .router
            .oneshot(upload_request("data.zip", b"not a zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "MALFORMED_ARCHIVE");
    }

    #[tokio::test]
    async fn missing_secret_returns_502() {
        let h = harness(JobScript::Succeed, false);
        let zip = build_zip(&[("a.csv", b"1")]);

        let response = h.router.oneshot(upload_request("data.zip", &zip)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await;
        assert_eq!(body["code"], "SECRET_NOT_FOUND");
        // The envelope names the secret, never its value.
        assert!(body["message"].as_str().unwrap().contains("model-id"));
        assert_eq!(h.jobs.submit_count(), 0);
    }

    #[tokio::test]
    async fn failed_job_returns_502() {
        let h = harness(JobScript::FailExecution("dead".to_string()), true);
        let zip = build_zip(&[("a.csv", b"1")]);

        let response = h.router.oneshot(upload_request("data.zip", &zip)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "JOB_EXECUTION_FAILED");
    }

    #[tokio::test]
    async fn inbound_request_id_is_echoed() {
        let h = harness(JobScript::Succeed, true);
        let zip = build_zip(&[("a.csv", b"1")]);
        let mut request = upload_request("data.zip", &zip);
        request
            .headers_mut()
            .insert("x-request-id", "client-req-7".parse().unwrap());

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            "client-req-7"
        );
        let body = body_json(response).await;
        assert_eq!(body["requestId"], "client-req-7");
    }

    #[tokio::test]
    async fn debug_server_completes_an_upload_end_to_end() {
        let server = Server::new(test_config());
        let zip = build_zip(&[("a.csv", b"1")]);
        let response = server
            .test_router()
            .oneshot(upload_request("data.zip", &zip))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
