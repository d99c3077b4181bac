//! Configuration parsing for the greeter service.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;
use std::net::SocketAddr;

use crate::error::Result;
use crate::observability::telemetry::SpanSink;

/// Greeter: a single-endpoint greeting service with OpenTelemetry instrumentation.
#[derive(Parser, Debug, Clone)]
#[command(name = "greeter")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "GREETER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "GREETER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Service name attached to every exported metric and span
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "greeter")]
    pub service_name: String,

    /// OTLP collector endpoint for span export; spans go to stdout when unset
    #[arg(long, env = "OTLP_ENDPOINT_URL")]
    pub otlp_endpoint_url: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Socket address the HTTP listener binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Where completed spans are exported.
    pub fn span_sink(&self) -> SpanSink {
        SpanSink::from_endpoint(self.otlp_endpoint_url.as_deref())
    }

    /// Create a configuration bound to a random loopback port.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "debug".into(),
            service_name: "greeter-test".into(),
            otlp_endpoint_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            service_name: "greeter".into(),
            otlp_endpoint_url: None,
        }
    }
}
