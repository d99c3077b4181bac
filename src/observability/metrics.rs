//! Metric instruments recorded by the service.
//!
//! Key metrics:
//! - greetings.count: Counter for greetings served (scraped as `greetings_count`)
//! - http.server.request.duration: Histogram for inbound request latency
//! - http.server.active_requests: Up-down counter for in-flight requests
//! - http.server.active_connections: Up-down counter for open connections
//! - http.server.connection.duration: Histogram for connection lifetime

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;

/// Scope name of the custom greeting meter.
pub const METER_NAME: &str = "customMeter.Example";

/// Version reported with the custom greeting meter.
pub const METER_VERSION: &str = "1.0.0";

/// Scope name used for host (HTTP server) instrumentation.
pub const HOSTING_SCOPE: &str = "greeter.hosting";

/// Instruments owned by the custom greeting meter.
#[derive(Debug, Clone)]
pub struct GreetingMetrics {
    /// Number of greetings served.
    pub greetings_count: Counter<u64>,
}

impl GreetingMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            greetings_count: meter
                .u64_counter("greetings.count")
                .with_description("Counts the number of greetings")
                .build(),
        }
    }

    /// Record one greeting.
    pub fn record_greeting(&self) {
        self.greetings_count.add(1, &[]);
    }
}

/// Inbound HTTP server instruments.
#[derive(Debug, Clone)]
pub struct HttpServerMetrics {
    /// Request latency in seconds.
    pub request_duration: Histogram<f64>,
    /// Requests currently being handled.
    pub active_requests: UpDownCounter<i64>,
}

impl HttpServerMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            request_duration: meter
                .f64_histogram("http.server.request.duration")
                .with_description("Duration of inbound HTTP requests")
                .with_unit("s")
                .build(),
            active_requests: meter
                .i64_up_down_counter("http.server.active_requests")
                .with_description("Number of inbound HTTP requests in flight")
                .build(),
        }
    }

    /// Mark a request as started.
    pub fn request_started(&self, method: &str) {
        self.active_requests.add(1, &[method_attribute(method)]);
    }

    /// Mark a request as finished and record its latency.
    ///
    /// `route` is the matched route template; requests that matched no route
    /// are recorded without an `http.route` attribute.
    pub fn request_finished(&self, method: &str, route: Option<&str>, status: u16, seconds: f64) {
        let method = method_attribute(method);
        self.active_requests.add(-1, std::slice::from_ref(&method));

        let mut attrs = vec![
            method,
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        if let Some(route) = route {
            attrs.push(KeyValue::new("http.route", route.to_string()));
        }
        self.request_duration.record(seconds, &attrs);
    }
}

fn method_attribute(method: &str) -> KeyValue {
    KeyValue::new("http.request.method", method.to_string())
}

/// Inbound TCP connection instruments.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    /// Connections currently open.
    pub active_connections: UpDownCounter<i64>,
    /// Connection lifetime in seconds.
    pub connection_duration: Histogram<f64>,
}

impl ConnectionMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            active_connections: meter
                .i64_up_down_counter("http.server.active_connections")
                .with_description("Number of open inbound connections")
                .build(),
            connection_duration: meter
                .f64_histogram("http.server.connection.duration")
                .with_description("Duration of inbound connections")
                .with_unit("s")
                .build(),
        }
    }

    /// Record an accepted connection.
    pub fn connection_opened(&self) {
        self.active_connections.add(1, &[]);
    }

    /// Record a closed connection and how long it was open.
    pub fn connection_closed(&self, seconds: f64) {
        self.active_connections.add(-1, &[]);
        self.connection_duration.record(seconds, &[]);
    }
}
