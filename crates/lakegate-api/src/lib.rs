//! # lakegate-api
//!
//! HTTP composition layer for the lakegate ingestion service.
//!
//! This crate provides the API surface for lakegate, handling:
//!
//! - **Routing**: the upload endpoint plus health, ready, and metrics
//! - **Service Wiring**: composition of the store, vault, and job clients
//! - **Observability**: request IDs, metrics, tracing, and health checks
//!
//! ## Design Principles
//!
//! This crate is a **thin composition layer** with no domain policy.
//! All ingestion logic lives in `lakegate-ingest`.
//!
//! ## Endpoints
//!
//! ```text
//! POST /api      - Upload an archive and dispatch the training job
//! GET  /health   - Health check
//! GET  /ready    - Readiness check (shallow object store probe)
//! GET  /metrics  - Prometheus text exposition
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::context::RequestContext;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::Server;
}
