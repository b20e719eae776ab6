// E2E tests for the search gateway endpoint
mod common;

use common::*;
use services::search::{
    MockSearchProvider, MockSearchProviderTrait, SearchError, SearchResponse,
};
use inference_providers::MockProvider;

#[tokio::test]
async fn test_search_returns_normalized_results() {
    let search = MockSearchProvider::default();
    let server = setup_test_server_with(search.clone(), MockProvider::default());

    let response = server
        .post("/api/search")
        .json(&serde_json::json!({
            "query": "rust",
            "includeImages": true,
            "includeImageDescriptions": true
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: SearchResponse = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(body.results.len(), 3);
    assert!(body.results[0].is_answer());
    assert_eq!(body.answer.as_deref(), Some("A short answer about rust."));

    let calls = search.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].query, "rust");
    assert!(calls[0].include_images);
    assert!(calls[0].include_image_descriptions);
}

#[tokio::test]
async fn test_search_upstream_error_returns_message() {
    let mut search = MockSearchProviderTrait::new();
    search.expect_search().returning(|_, _| {
        Err(SearchError::Upstream {
            status: 401,
            message: "Unauthorized: missing or invalid API key.".to_string(),
        })
    });
    let server = setup_test_server_with(search, MockProvider::default());

    let response = server
        .post("/api/search")
        .json(&serde_json::json!({"query": "rust"}))
        .await;

    assert_eq!(response.status_code(), 500);
    let error = serde_json::from_str::<api::models::ErrorResponse>(&response.text())
        .expect("Failed to parse error response");
    assert_eq!(error.error, "Unauthorized: missing or invalid API key.");
}

#[tokio::test]
async fn test_search_missing_results_is_format_error() {
    let server = setup_test_server_with(
        MockSearchProvider::failing(SearchError::Format("response has no results field".to_string())),
        MockProvider::default(),
    );

    let response = server
        .post("/api/search")
        .json(&serde_json::json!({"query": "rust"}))
        .await;

    assert_eq!(response.status_code(), 500);
    let error: api::models::ErrorResponse = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(error.error, "Invalid response format from search provider");
}

#[tokio::test]
async fn test_search_rejects_blank_query() {
    let server = setup_test_server();

    let response = server
        .post("/api/search")
        .json(&serde_json::json!({"query": "   "}))
        .await;

    assert_eq!(response.status_code(), 400);
}
