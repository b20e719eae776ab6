//! Integration tests for the OpenAI-compatible provider
//!
//! An httpmock server stands in for the upstream, so the full request path
//! (headers, body, status handling, event-stream reassembly) is exercised
//! without network access.
//! Run with: `cargo test --test integration_tests -- --nocapture`

use futures_util::StreamExt;
use httpmock::prelude::*;
use inference_providers::{
    ChatMessage, CompletionError, FrameDelta, InferenceProvider, OpenAiCompatibleConfig,
    OpenAiCompatibleProvider, ResponseTemplate,
};
use tokio_util::sync::CancellationToken;

fn create_test_provider(server: &MockServer) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::new(OpenAiCompatibleConfig {
        base_url: server.base_url(),
        api_key: "sk-or-test".to_string(),
        model: "deepseek/deepseek-r1:free".to_string(),
        max_tokens: 4000,
        temperature: 0.7,
        timeout_seconds: 10,
    })
    .expect("client should build")
}

fn split_deltas(frames: &[Result<inference_providers::StreamFrame, CompletionError>]) -> (String, String) {
    let mut reasoning = String::new();
    let mut content = String::new();
    for frame in frames {
        match frame.as_ref().expect("frame should be ok").delta() {
            Some(FrameDelta::Reasoning(r)) => reasoning.push_str(r),
            Some(FrameDelta::Content(c)) => content.push_str(c),
            None => {}
        }
    }
    (reasoning, content)
}

#[tokio::test]
async fn test_streaming_completion_reassembles_frames() {
    let server = MockServer::start_async().await;
    let payload = ResponseTemplate::new("Rust is a systems language.")
        .with_reasoning("The user wants a summary.")
        .sse_payload();

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("Authorization", "Bearer sk-or-test")
                .header("Accept", "text/event-stream")
                .json_body_partial(r#"{"model":"deepseek/deepseek-r1:free","stream":true}"#);
            then.status(200)
                .header("Content-Type", "text/event-stream")
                .body(payload);
        })
        .await;

    let provider = create_test_provider(&server);
    let cancel = CancellationToken::new();
    let frames: Vec<_> = provider
        .chat_completion_stream(vec![ChatMessage::user("What is Rust?")], &cancel)
        .await
        .expect("stream should open")
        .collect()
        .await;

    mock.assert_async().await;
    let (reasoning, content) = split_deltas(&frames);
    assert_eq!(reasoning, "The user wants a summary.");
    assert_eq!(content, "Rust is a systems language.");
}

#[tokio::test]
async fn test_messages_are_sent_in_order() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions").json_body_partial(
                r#"{"messages":[
                    {"role":"user","content":"q"},
                    {"role":"assistant","content":"ack"},
                    {"role":"user","content":"prompt"}
                ]}"#,
            );
            then.status(200).body("data: [DONE]\n\n");
        })
        .await;

    let provider = create_test_provider(&server);
    let cancel = CancellationToken::new();
    let messages = vec![
        ChatMessage::user("q"),
        ChatMessage::assistant("ack"),
        ChatMessage::user("prompt"),
    ];
    let frames: Vec<_> = provider
        .chat_completion_stream(messages, &cancel)
        .await
        .expect("stream should open")
        .collect()
        .await;

    mock.assert_async().await;
    assert!(frames.is_empty());
}

#[tokio::test]
async fn test_non_success_status_returns_raw_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("Rate limit exceeded: free-models-per-day");
        })
        .await;

    let provider = create_test_provider(&server);
    let cancel = CancellationToken::new();
    let result = provider
        .chat_completion_stream(vec![ChatMessage::user("hi")], &cancel)
        .await;

    match result {
        Err(CompletionError::HttpError {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 429);
            assert_eq!(message, "Rate limit exceeded: free-models-per-day");
        }
        other => panic!("expected HttpError, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_empty_success_body_is_no_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200);
        })
        .await;

    let provider = create_test_provider(&server);
    let cancel = CancellationToken::new();
    let result = provider
        .chat_completion_stream(vec![ChatMessage::user("hi")], &cancel)
        .await;

    assert!(matches!(result, Err(CompletionError::NoBody)));
}

#[tokio::test]
async fn test_cancelled_before_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .delay(std::time::Duration::from_secs(5))
                .body("data: [DONE]\n\n");
        })
        .await;

    let provider = create_test_provider(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = provider
        .chat_completion_stream(vec![ChatMessage::user("hi")], &cancel)
        .await;
    assert!(matches!(result, Err(CompletionError::Cancelled)));
}
