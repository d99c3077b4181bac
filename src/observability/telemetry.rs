//! Telemetry pipeline setup.
//!
//! Builds the process-wide metrics and tracing pipeline once at startup and
//! hands it to the HTTP layer as an explicit [`Telemetry`] context:
//! - Metrics are pulled: an `opentelemetry-prometheus` reader feeds a
//!   Prometheus registry that `/metrics` gathers on demand
//! - Spans are pushed to an OTLP collector when an endpoint is configured,
//!   otherwise written to stdout

use std::fmt;

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::export::trace::SpanExporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use prometheus::Registry;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::metrics::{
    ConnectionMetrics, GreetingMetrics, HttpServerMetrics, HOSTING_SCOPE, METER_NAME,
    METER_VERSION,
};

/// Scope name of the tracer that produces the custom greeting spans.
pub const ACTIVITY_SOURCE_NAME: &str = "customActivity.Example";

/// Destination for completed spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanSink {
    /// Write spans to stdout.
    Console,
    /// Push spans to an OTLP collector over gRPC.
    Otlp { endpoint: String },
}

impl SpanSink {
    /// Choose the sink from the optional collector endpoint.
    ///
    /// A missing or blank endpoint selects the console.
    pub fn from_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint.map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => Self::Otlp {
                endpoint: endpoint.to_string(),
            },
            _ => Self::Console,
        }
    }

    fn tracer_provider(&self, resource: Resource) -> Result<TracerProvider> {
        let builder = TracerProvider::builder().with_resource(resource);

        let provider = match self {
            Self::Console => builder
                .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
                .build(),
            Self::Otlp { endpoint } => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint.as_str())
                    .build()
                    .map_err(|e| Error::exporter("OTLP span", e))?;
                builder.with_batch_exporter(exporter, runtime::Tokio).build()
            }
        };
        Ok(provider)
    }
}

impl fmt::Display for SpanSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => f.write_str("console"),
            Self::Otlp { endpoint } => write!(f, "otlp ({endpoint})"),
        }
    }
}

/// Process-wide telemetry handles shared with every request.
pub struct Telemetry {
    service_name: String,
    span_sink: Option<SpanSink>,
    registry: Registry,
    meter_provider: SdkMeterProvider,
    tracer_provider: TracerProvider,
    tracer: Tracer,
    host_tracer: Tracer,
    propagator: TraceContextPropagator,
    greetings: GreetingMetrics,
    http: HttpServerMetrics,
    connections: ConnectionMetrics,
}

impl Telemetry {
    /// Build the pipeline from configuration, selecting the span sink once.
    pub fn init(config: &Config) -> Result<Self> {
        let sink = config.span_sink();
        let resource = service_resource(&config.service_name);
        let tracer_provider = sink.tracer_provider(resource.clone())?;
        Self::assemble(&config.service_name, Some(sink), resource, tracer_provider)
    }

    /// Build the pipeline around a caller-supplied span exporter.
    ///
    /// Spans are exported synchronously as they end.
    pub fn with_span_exporter<E>(service_name: &str, exporter: E) -> Result<Self>
    where
        E: SpanExporter + 'static,
    {
        let resource = service_resource(service_name);
        let tracer_provider = TracerProvider::builder()
            .with_resource(resource.clone())
            .with_simple_exporter(exporter)
            .build();
        Self::assemble(service_name, None, resource, tracer_provider)
    }

    fn assemble(
        service_name: &str,
        span_sink: Option<SpanSink>,
        resource: Resource,
        tracer_provider: TracerProvider,
    ) -> Result<Self> {
        let registry = Registry::new();
        let reader = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .without_counter_suffixes()
            .build()
            .map_err(|e| Error::exporter("Prometheus metrics", e))?;

        let meter_provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource)
            .build();

        let greeting_meter = meter_provider.meter_with_scope(
            InstrumentationScope::builder(METER_NAME)
                .with_version(METER_VERSION)
                .build(),
        );
        let hosting_meter = meter_provider.meter(HOSTING_SCOPE);

        Ok(Self {
            service_name: service_name.to_string(),
            span_sink,
            greetings: GreetingMetrics::new(&greeting_meter),
            http: HttpServerMetrics::new(&hosting_meter),
            connections: ConnectionMetrics::new(&hosting_meter),
            tracer: tracer_provider.tracer(ACTIVITY_SOURCE_NAME),
            host_tracer: tracer_provider.tracer(HOSTING_SCOPE),
            propagator: TraceContextPropagator::new(),
            registry,
            meter_provider,
            tracer_provider,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The sink chosen at startup, if the pipeline was built from configuration.
    pub fn span_sink(&self) -> Option<&SpanSink> {
        self.span_sink.as_ref()
    }

    /// Tracer for the custom greeting spans.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Tracer backing the `tracing` bridge for host request spans.
    pub fn host_tracer(&self) -> Tracer {
        self.host_tracer.clone()
    }

    pub fn propagator(&self) -> &TraceContextPropagator {
        &self.propagator
    }

    /// Registry gathered by the Prometheus scraping endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn greetings(&self) -> &GreetingMetrics {
        &self.greetings
    }

    pub fn http(&self) -> &HttpServerMetrics {
        &self.http
    }

    pub fn connections(&self) -> &ConnectionMetrics {
        &self.connections
    }

    /// Flush pending spans and stop both providers.
    ///
    /// Export failures are logged and otherwise ignored.
    pub fn shutdown(&self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down meter provider");
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.service_name)
            .field("span_sink", &self.span_sink)
            .finish_non_exhaustive()
    }
}

fn service_resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}
