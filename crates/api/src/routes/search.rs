use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::search::{SearchError, SearchParams, SearchResponse};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    models::{ErrorResponse, SearchRequest},
    AppState,
};

/// Map search errors to HTTP status codes
pub fn map_search_error_to_status(error: &SearchError) -> StatusCode {
    match error {
        SearchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Upstream { .. } | SearchError::Format(_) | SearchError::RequestFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Web search
///
/// Runs one search against the configured provider and returns the normalized
/// response. When the provider produced a direct answer it is the first result.
#[utoipa::path(
    post,
    path = "/api/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Normalized search results", body = SearchResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Search provider failure", body = ErrorResponse),
    ),
    tag = "Search"
)]
pub async fn search(
    State(app_state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    debug!(
        "Search request: query_len={}, include_images={}",
        request.query.len(),
        request.include_images
    );
    if let Err(error) = request.validate() {
        return (StatusCode::BAD_REQUEST, ResponseJson(ErrorResponse::new(error))).into_response();
    }

    let params = SearchParams {
        query: request.query,
        include_images: request.include_images,
        include_image_descriptions: request.include_image_descriptions,
    };
    // Dropping this handler's future on disconnect drops the request with it
    let cancel = CancellationToken::new();

    match app_state.search_provider.search(params, &cancel).await {
        Ok(response) => (StatusCode::OK, ResponseJson(response)).into_response(),
        Err(error) => {
            tracing::error!(error = %error, "Search request failed");
            (
                map_search_error_to_status(&error),
                ResponseJson(ErrorResponse::new(error.user_message())),
            )
                .into_response()
        }
    }
}
