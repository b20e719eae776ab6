mod common;

use common::*;

#[tokio::test]
async fn test_health_endpoint() {
    let server = setup_test_server();

    let response = server.get("/v1/health").await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let server = setup_test_server();

    let response = server.get("/api-docs/openapi.json").await;

    assert_eq!(response.status_code(), 200);
    let doc: serde_json::Value = serde_json::from_str(&response.text()).unwrap();
    assert!(doc["paths"]["/v1/research"].is_object());
    assert!(doc["paths"]["/api/chat"].is_object());
}
