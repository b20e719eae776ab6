use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json as ResponseJson, Response},
};
use futures::StreamExt;
use inference_providers::{ChatMessage, CompletionError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    models::{ChatRequest, ErrorResponse},
    AppState,
};

fn completion_error_message(error: &CompletionError) -> String {
    match error {
        CompletionError::HttpError { message, .. } => {
            format!("Failed to get response from completion provider: {message}")
        }
        CompletionError::NoBody => "No response body available".to_string(),
        other => other.to_string(),
    }
}

/// Streamed chat completion
///
/// Forwards the messages to the completion provider and re-emits every
/// reassembled frame as one compact JSON object per line. A failure before the
/// first byte is returned as a JSON error; a failure mid-stream ends the body.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Newline-delimited JSON frames", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Completion provider failure", body = ErrorResponse),
    ),
    tag = "Chat"
)]
pub async fn chat(State(app_state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    debug!("Chat request: messages={}", request.messages.len());
    if let Err(error) = request.validate() {
        return (StatusCode::BAD_REQUEST, ResponseJson(ErrorResponse::new(error))).into_response();
    }

    let messages: Vec<ChatMessage> = request.messages.iter().map(ChatMessage::from).collect();
    // The body stream owns the upstream connection; a client disconnect drops both
    let cancel = CancellationToken::new();

    match app_state
        .inference_provider
        .chat_completion_stream(messages, &cancel)
        .await
    {
        Ok(stream) => {
            let body = stream.map(|frame| {
                frame
                    .map(|frame| frame.to_ndjson())
                    .inspect_err(|e| tracing::error!("Completion stream error: {}", e))
            });

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(body))
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to build streaming response: {}", e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
        }
        Err(error) => {
            tracing::error!(error = %error, "Chat completion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(ErrorResponse::new(completion_error_message(&error))),
            )
                .into_response()
        }
    }
}
