//! HTTP route definitions.

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

pub mod ingest;

/// Builds the API routes.
pub fn api_routes() -> Router<Arc<AppState>> {
    ingest::routes()
}
