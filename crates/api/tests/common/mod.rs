#![allow(dead_code)]

use api::{build_app, DomainServices};
use inference_providers::{InferenceProvider, MockProvider};
use services::search::{MockSearchProvider, SearchProviderTrait};
use std::sync::Arc;

/// Setup a test server backed by the given providers
pub fn setup_test_server_with(
    search_provider: impl SearchProviderTrait + 'static,
    inference_provider: impl InferenceProvider + 'static,
) -> axum_test::TestServer {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .try_init();

    let app = build_app(DomainServices {
        search_provider: Arc::new(search_provider),
        inference_provider: Arc::new(inference_provider),
    });
    axum_test::TestServer::new(app).expect("Failed to create test server")
}

/// Setup a test server with the default scripted providers
pub fn setup_test_server() -> axum_test::TestServer {
    setup_test_server_with(MockSearchProvider::default(), MockProvider::default())
}

/// Parse a server-sent-event body into `(event, data)` pairs
pub fn parse_sse_events(body: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut event = String::from("message");
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push((event.clone(), data.join("\n")));
            }
            event = String::from("message");
            data.clear();
        } else if let Some(name) = line.strip_prefix("event:") {
            event = name.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if !data.is_empty() {
        events.push((event, data.join("\n")));
    }
    events
}
