//! Greeting handler implementation.
//!
//! Each request produces one `RKCustomActivity` span, one log line and one
//! increment of `greetings.count`. The log line is also recorded as an event
//! on the span, which is the current OpenTelemetry context while it runs.

use axum::extract::State;
use opentelemetry::trace::{TraceContextExt, Tracer as _};
use opentelemetry::KeyValue;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::observability::telemetry::Telemetry;
use crate::server::AppState;

/// Response body returned by `GET /`.
pub const GREETING: &str = "Welcome Ramakrishna!";

/// Value of the `greeting` attribute set on the custom span.
pub const GREETING_TAG: &str = "Hello Ramakrishna!";

/// Name of the span started for every greeting.
pub const ACTIVITY_NAME: &str = "RKCustomActivity";

/// Handle GET / - send the greeting.
pub async fn send_greeting(State(state): State<AppState>) -> &'static str {
    greet(&state.telemetry)
}

fn greet(telemetry: &Telemetry) -> &'static str {
    let parent = tracing::Span::current().context();
    let activity = telemetry
        .tracer()
        .start_with_context(ACTIVITY_NAME, &parent);

    // The activity is current until return and ends once both handles drop.
    let cx = parent.with_span(activity);
    let _guard = cx.clone().attach();
    let activity = cx.span();

    let ids = activity.span_context();
    tracing::info!(
        trace_id = %ids.trace_id(),
        span_id = %ids.span_id(),
        "Sending greeting"
    );
    activity.add_event("Sending greeting", Vec::new());

    telemetry.greetings().record_greeting();

    if activity.is_recording() {
        activity.set_attribute(KeyValue::new("greeting", GREETING_TAG));
    }

    GREETING
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use std::sync::Arc;

    fn state(exporter: &InMemorySpanExporter) -> AppState {
        let telemetry = Telemetry::with_span_exporter("test", exporter.clone()).unwrap();
        AppState::new(Arc::new(telemetry))
    }

    #[tokio::test]
    async fn test_send_greeting_returns_body() {
        let exporter = InMemorySpanExporter::default();
        let body = send_greeting(State(state(&exporter))).await;
        assert_eq!(body, "Welcome Ramakrishna!");
    }

    #[tokio::test]
    async fn test_send_greeting_ends_one_tagged_span() {
        let exporter = InMemorySpanExporter::default();
        let state = state(&exporter);

        send_greeting(State(state.clone())).await;

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, ACTIVITY_NAME);
        assert!(spans[0]
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == "greeting" && kv.value.as_str() == GREETING_TAG));
    }

    #[tokio::test]
    async fn test_greeting_log_is_recorded_on_activity() {
        let exporter = InMemorySpanExporter::default();

        send_greeting(State(state(&exporter))).await;

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0]
            .events
            .iter()
            .any(|event| event.name == "Sending greeting"));
    }

    #[test]
    fn test_activity_context_is_detached_after_greeting() {
        let exporter = InMemorySpanExporter::default();
        let telemetry = Telemetry::with_span_exporter("test", exporter.clone()).unwrap();

        greet(&telemetry);

        // Detached again after return.
        assert!(!opentelemetry::Context::current().has_active_span());
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].name, ACTIVITY_NAME);
    }
}
