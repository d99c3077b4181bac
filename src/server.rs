//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - `GET /` greeting handler and `GET /metrics` scraping endpoint
//! - Server spans for every request, continuing inbound W3C trace context
//! - Request duration and in-flight metrics, including unmatched requests
//! - Connection metrics on the accepting listener
//! - Graceful shutdown support

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{FromRef, MatchedPath, Request, State},
    http::Response,
    middleware::{self, Next},
    routing::get,
    Router,
};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::{MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::Config;
use crate::error::Result;
use crate::listener::InstrumentedListener;
use crate::observability::prometheus::{metrics_handler, METRICS_PATH};
use crate::observability::telemetry::Telemetry;
use crate::service::send_greeting;

/// Server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub telemetry: Arc<Telemetry>,
}

impl AppState {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self { telemetry }
    }
}

impl FromRef<AppState> for Registry {
    fn from_ref(state: &AppState) -> Self {
        state.telemetry.registry().clone()
    }
}

/// Create the service router.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(ServerSpan::new(state.telemetry.propagator().clone()))
        .on_response(RecordStatus);

    Router::new()
        .route("/", get(send_greeting))
        .route(METRICS_PATH, get(metrics_handler))
        .route_layer(middleware::from_fn(expose_matched_path))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_http_metrics,
        ))
        .layer(ServiceBuilder::new().layer(trace_layer))
        .with_state(state)
}

/// Copy the matched route onto the response for the outer metrics layer.
async fn expose_matched_path(
    matched: MatchedPath,
    request: Request,
    next: Next,
) -> axum::response::Response {
    let mut response = next.run(request).await;
    response.extensions_mut().insert(matched);
    response
}

/// Record `http.server.*` metrics around every request.
///
/// Requests that match no route are recorded without `http.route`.
async fn track_http_metrics(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> axum::response::Response {
    let method = request.method().to_string();

    let metrics = state.telemetry.http();
    metrics.request_started(&method);
    let start = Instant::now();

    let response = next.run(request).await;

    let route = response.extensions().get::<MatchedPath>();
    metrics.request_finished(
        &method,
        route.map(MatchedPath::as_str),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Creates one server span per request, parented on inbound trace context.
#[derive(Clone, Debug)]
struct ServerSpan {
    propagator: TraceContextPropagator,
}

impl ServerSpan {
    fn new(propagator: TraceContextPropagator) -> Self {
        Self { propagator }
    }
}

impl<B> MakeSpan<B> for ServerSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let span = tracing::info_span!(
            "http_request",
            otel.name = %format!("{} {}", request.method(), request.uri().path()),
            otel.kind = "server",
            http.request.method = %request.method(),
            url.path = %request.uri().path(),
            http.response.status_code = tracing::field::Empty,
        );
        let parent = self.propagator.extract(&HeaderExtractor(request.headers()));
        span.set_parent(parent);
        span
    }
}

/// Records the response status on the server span.
#[derive(Clone, Copy, Debug)]
struct RecordStatus;

impl<B> OnResponse<B> for RecordStatus {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();
        span.record("http.response.status_code", status);
        tracing::debug!(status, ?latency, "Request finished");
    }
}

/// Serve the router on an already-bound listener until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let listener = InstrumentedListener::new(listener, state.telemetry.connections().clone());
    let app = create_router(state);

    let address = axum::serve::Listener::local_addr(&listener)?;
    tracing::info!(%address, "Starting greeter HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Run the greeter HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `telemetry` - Telemetry context shared with every request
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: &Config,
    telemetry: Arc<Telemetry>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr()?).await?;
    serve(listener, AppState::new(telemetry), shutdown_rx).await
}
