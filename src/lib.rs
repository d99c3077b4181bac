//! Greeter: a single-endpoint greeting service with OpenTelemetry instrumentation.
//!
//! `GET /` answers with a fixed greeting while recording one custom span and
//! one counter increment; `GET /metrics` exposes every metric for Prometheus.
//!
//! # Architecture
//!
//! - **Explicit telemetry context**: meter and tracer providers are built once
//!   and injected into the router, never read from global state
//! - **Pull-based metrics**: values are gathered only when scraped
//! - **Configurable span export**: OTLP collector when configured, stdout otherwise
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Startup and server errors
//! - [`listener`]: TCP listener with connection metrics
//! - [`observability`]: Telemetry pipeline, instruments and tracing setup
//! - [`server`]: HTTP router and lifecycle
//! - [`service`]: Request handlers

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // observability::telemetry::Telemetry is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod error;
pub mod listener;
pub mod observability;
pub mod server;
pub mod service;

pub use error::{Error, Result};
