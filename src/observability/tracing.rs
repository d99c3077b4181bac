//! Logging and trace bridge setup.
//!
//! Configures structured logging with:
//! - Environment-based filter (via RUST_LOG) on console output only
//! - A `tracing-opentelemetry` layer so request spans share the span pipeline

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::Result;
use crate::observability::telemetry::Telemetry;

/// Install the global tracing subscriber.
///
/// This sets up:
/// - Console logging with structured format
/// - A console filter built from `log_level`, falling back to `info` when invalid
/// - Export of the service's own `tracing` spans through the telemetry host
///   tracer, independent of `log_level`
///
/// Fails if a global subscriber has already been installed.
pub fn init_tracing(log_level: &str, telemetry: &Telemetry) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    let otel_layer = tracing_opentelemetry::layer()
        .with_tracer(telemetry.host_tracer())
        .with_filter(host_span_targets());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(service = telemetry.service_name(), "Tracing initialized");
    Ok(())
}

/// Spans exported as host telemetry: everything this crate emits at `info` or above.
fn host_span_targets() -> Targets {
    Targets::new().with_target(env!("CARGO_CRATE_NAME"), Level::INFO)
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
