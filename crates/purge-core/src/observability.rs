//! Observability infrastructure for purge.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors shared by every purge binary.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
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
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `purge_jobs=debug`)
///
/// # Example
///
/// ```rust
/// use purge_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
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

/// Creates a span for job lifecycle operations.
///
/// # Example
///
/// ```rust
/// use purge_core::observability::job_span;
///
/// let span = job_span("fold_event", "job-123");
/// let _guard = span.enter();
/// // ... do job operation
/// ```
#[must_use]
pub fn job_span(operation: &str, job_id: &str) -> Span {
    tracing::info_span!("job", op = operation, job_id = job_id)
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
    fn job_span_creates_span() {
        let span = job_span("test_operation", "job-123");
        let _guard = span.enter();
        tracing::info!("job message");
    }
}
