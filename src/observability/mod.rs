//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - The telemetry context (meter and tracer providers, exporters)
//! - Metric instruments for greetings and inbound HTTP requests
//! - Structured logging bridged into OpenTelemetry spans
//! - The Prometheus scraping endpoint

pub mod metrics;
pub mod prometheus;
pub mod telemetry;
pub mod tracing;
