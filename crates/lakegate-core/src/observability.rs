//! Observability infrastructure for lakegate.
//!
//! Structured logging with consistent spans. Secret values must never be
//! logged anywhere in the workspace; the redaction lives on
//! [`crate::secrets::SecretValue`] so that a stray `{:?}` cannot leak one.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `lakegate_ingest=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for one ingest request with standard fields.
///
/// # Example
///
/// ```rust
/// use lakegate_core::observability::ingest_span;
///
/// let span = ingest_span("ingest", "01J9ZX2R7M7T7W7Q");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn ingest_span(operation: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "ingest",
        op = operation,
        request_id = request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn ingest_span_carries_fields() {
        let span = ingest_span("ingest", "req-1");
        let _guard = span.enter();
        tracing::info!("message inside span");
    }
}
