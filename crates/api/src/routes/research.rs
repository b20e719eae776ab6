use std::convert::Infallible;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json as ResponseJson, Response,
    },
};
use futures::StreamExt;
use services::research::{Message, ResearchError};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::{
    models::{ErrorResponse, ResearchRequest, SectionResponse},
    AppState,
};

/// Submit a research query
///
/// Cancels the research in flight, if any, and streams snapshots of the new
/// section as `section` events until it reaches a terminal phase, followed by
/// a `done` event.
#[utoipa::path(
    post,
    path = "/v1/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Section snapshots as server-sent events", body = SectionResponse, content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    tag = "Research"
)]
pub async fn submit_research(
    State(app_state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> Response {
    let active = match app_state.research.submit(request.query).await {
        Ok(active) => active,
        Err(error @ ResearchError::EmptyQuery) => {
            return (
                StatusCode::BAD_REQUEST,
                ResponseJson(ErrorResponse::new(error.user_message())),
            )
                .into_response();
        }
        Err(error) => {
            tracing::error!(error = %error, "Failed to submit research");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(ErrorResponse::new(error.user_message())),
            )
                .into_response();
        }
    };
    debug!(section_id = %active.section_id(), "Streaming research updates");

    // Ends once the research task drops its sender
    let sse_stream = WatchStream::new(active.updates())
        .map(|section| {
            Event::default()
                .event("section")
                .json_data(SectionResponse::from(section))
                .or_else(|e| {
                    tracing::error!("Failed to serialize section: {}", e);
                    Ok::<_, Infallible>(Event::default().event("error").data(e.to_string()))
                })
        })
        .chain(futures::stream::once(async move {
            Ok::<_, Infallible>(Event::default().event("done").data("[DONE]"))
        }));

    Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(30))
                .text("keep-alive-text"),
        )
        .into_response()
}

/// List research sections
///
/// Snapshots of every section of the session, oldest first.
#[utoipa::path(
    get,
    path = "/v1/research/sections",
    responses(
        (status = 200, description = "All sections", body = Vec<SectionResponse>),
    ),
    tag = "Research"
)]
pub async fn list_sections(State(app_state): State<AppState>) -> ResponseJson<Vec<SectionResponse>> {
    let sections = app_state.research.sections().await;
    ResponseJson(sections.into_iter().map(SectionResponse::from).collect())
}

/// Research transcript
///
/// User and assistant messages of completed research turns.
#[utoipa::path(
    get,
    path = "/v1/research/messages",
    responses(
        (status = 200, description = "Transcript of completed turns", body = Vec<Message>),
    ),
    tag = "Research"
)]
pub async fn list_messages(State(app_state): State<AppState>) -> ResponseJson<Vec<Message>> {
    ResponseJson(app_state.research.messages().await)
}

/// Cancel the research in flight
#[utoipa::path(
    delete,
    path = "/v1/research/active",
    responses(
        (status = 204, description = "Research in flight, if any, was cancelled"),
    ),
    tag = "Research"
)]
pub async fn cancel_research(State(app_state): State<AppState>) -> StatusCode {
    let cancelled = app_state.research.cancel_active().await;
    debug!(cancelled, "Cancel research requested");
    StatusCode::NO_CONTENT
}
