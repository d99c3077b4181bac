//! Test utilities and server harness for greeter tests.
//!
//! Provides:
//! - In-process test server on a random loopback port
//! - In-memory span capture
//! - Prometheus exposition helpers

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use greeter::observability::telemetry::Telemetry;
use greeter::server::{serve, AppState};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A greeter server running inside the test process.
pub struct TestServer {
    /// Address the server is listening on
    pub addr: SocketAddr,
    /// Telemetry context shared with the server
    pub telemetry: Arc<Telemetry>,
    exporter: InMemorySpanExporter,
    client: reqwest::Client,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<greeter::Result<()>>,
}

impl TestServer {
    /// Start a server whose spans are captured in memory.
    pub async fn start() -> Self {
        let exporter = InMemorySpanExporter::default();
        let telemetry = Arc::new(
            Telemetry::with_span_exporter("greeter-test", exporter.clone())
                .expect("failed to build telemetry"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind listener");
        let addr = listener.local_addr().expect("listener has no address");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = AppState::new(Arc::clone(&telemetry));
        let handle = tokio::spawn(serve(listener, state, shutdown_rx));

        Self {
            addr,
            telemetry,
            exporter,
            client: reqwest::Client::new(),
            shutdown_tx,
            handle,
        }
    }

    /// Absolute URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Issue a GET request.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("request failed")
    }

    /// Scrape `/metrics` and return the body.
    pub async fn scrape(&self) -> String {
        let response = self.get("/metrics").await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.text().await.expect("failed to read metrics body")
    }

    /// Spans exported so far.
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.exporter
            .get_finished_spans()
            .expect("failed to read exported spans")
    }

    /// Signal shutdown and wait for the server to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Value of the first sample of `name` in a text exposition body.
pub fn sample_value(body: &str, name: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

/// Check that every line of a text exposition body is well formed.
pub fn assert_valid_exposition(body: &str) {
    for line in body.lines().filter(|line| !line.is_empty()) {
        if let Some(comment) = line.strip_prefix('#') {
            let kind = comment.split_whitespace().next();
            assert!(
                matches!(kind, Some("HELP") | Some("TYPE")),
                "unexpected comment line: {line}"
            );
            continue;
        }

        let (series, value) = line
            .rsplit_once(' ')
            .unwrap_or_else(|| panic!("sample without value: {line}"));
        assert!(
            value.parse::<f64>().is_ok() || matches!(value, "+Inf" | "-Inf" | "NaN"),
            "invalid sample value in: {line}"
        );

        let name_end = series.find('{').unwrap_or(series.len());
        let name = &series[..name_end];
        assert!(
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':'),
            "invalid metric name in: {line}"
        );
        if name_end < series.len() {
            assert!(series.ends_with('}'), "unterminated labels in: {line}");
        }
    }
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
