//! Prometheus HTTP endpoint for metrics scraping.
//!
//! Gathering the registry pulls the current values out of the OpenTelemetry
//! meter provider; nothing is exported between scrapes.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, Registry, TextEncoder};

/// Path the scraping endpoint is mounted on.
pub const METRICS_PATH: &str = "/metrics";

/// Encode every registered metric family in the text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<Vec<u8>, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Handle GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(registry): State<Registry>) -> impl IntoResponse {
    match encode_metrics(&registry) {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}
