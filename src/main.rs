//! Greeter: a single-endpoint greeting service with OpenTelemetry instrumentation.
//!
//! # Usage
//!
//! ```bash
//! greeter --port 8080 --log-level info
//! ```
//!
//! Environment variables can also be used:
//! - `GREETER_PORT`: Port to listen on
//! - `OTEL_SERVICE_NAME`: Service name reported with telemetry
//! - `OTLP_ENDPOINT_URL`: OTLP collector for spans (stdout when unset)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use std::sync::Arc;

use greeter::config::Config;
use greeter::observability::telemetry::Telemetry;
use greeter::observability::tracing::init_tracing;
use greeter::server::run_server;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let spans = config.span_sink();
    eprintln!(
        r#"
  Greeter v{version} - OpenTelemetry demo service

  Configuration:
    Address:    {}:{}
    Service:    {}
    Spans:      {spans}
    Metrics:    /metrics
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        config.host, config.port, config.service_name, config.log_level
    );
}

/// Resolve once SIGINT (or SIGTERM on unix) is received.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Build the telemetry pipeline; the span sink is fixed from here on
    let telemetry = Arc::new(Telemetry::init(&config)?);

    // Initialize tracing/logging
    init_tracing(&config.log_level, &telemetry)?;
    tracing::info!(span_sink = %config.span_sink(), "Telemetry pipeline configured");

    print_banner(&config);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signals");
                // Dropping the sender would stop the server.
                std::future::pending::<()>().await;
            }
        }
    });

    let result = run_server(&config, Arc::clone(&telemetry), shutdown_rx).await;

    telemetry.shutdown();
    result?;

    tracing::info!("Greeter shutdown complete");
    Ok(())
}
