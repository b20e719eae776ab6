pub mod models;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use axum::{
    response::Html,
    routing::{delete, get, post},
    Router,
};
use config::{ApiConfig, CompletionProviderConfig};
use inference_providers::{
    CompletionError, InferenceProvider, OpenAiCompatibleConfig, OpenAiCompatibleProvider,
};
use services::{
    research::{ResearchSession, SearchOptions},
    search::{SearchError, SearchProviderTrait, TavilySearchProvider},
};
use utoipa::OpenApi;

use crate::{
    openapi::ApiDoc,
    routes::{
        cancel_research, chat, health_check, list_messages, list_sections, search,
        submit_research,
    },
};

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub search_provider: Arc<dyn SearchProviderTrait>,
    pub inference_provider: Arc<dyn InferenceProvider>,
    pub research: Arc<ResearchSession>,
}

/// Upstream gateways the routes are built on
pub struct DomainServices {
    pub search_provider: Arc<dyn SearchProviderTrait>,
    pub inference_provider: Arc<dyn InferenceProvider>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Failed to create search provider: {0}")]
    Search(#[from] SearchError),
    #[error("Failed to create completion provider: {0}")]
    Completion(#[from] CompletionError),
}

fn completion_provider_config(config: &CompletionProviderConfig) -> OpenAiCompatibleConfig {
    OpenAiCompatibleConfig {
        base_url: config.base_url.clone(),
        api_key: config.api_key.clone(),
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        timeout_seconds: config.timeout_seconds,
    }
}

/// Create the search and completion gateways from configuration
pub fn init_domain_services(config: &ApiConfig) -> Result<DomainServices, InitError> {
    let search_provider = TavilySearchProvider::new(&config.search)?;
    tracing::info!(base_url = %config.search.base_url, "Search provider configured");

    let inference_provider =
        OpenAiCompatibleProvider::new(completion_provider_config(&config.completion))?;
    tracing::info!(
        base_url = %config.completion.base_url,
        model = %config.completion.model,
        "Completion provider configured"
    );

    Ok(DomainServices {
        search_provider: Arc::new(search_provider),
        inference_provider: Arc::new(inference_provider),
    })
}

/// Build the complete application router
pub fn build_app(domain_services: DomainServices) -> Router {
    let research = Arc::new(
        ResearchSession::new(
            domain_services.search_provider.clone(),
            domain_services.inference_provider.clone(),
        )
        .with_search_options(SearchOptions {
            include_images: true,
            include_image_descriptions: true,
        }),
    );
    let app_state = AppState {
        search_provider: domain_services.search_provider,
        inference_provider: domain_services.inference_provider,
        research,
    };

    Router::new()
        .nest("/api", build_gateway_routes(app_state.clone()))
        .nest(
            "/v1",
            Router::new()
                .merge(build_research_routes(app_state))
                .merge(build_health_routes()),
        )
        .merge(build_openapi_routes())
}

/// Stateless search and chat gateways
pub fn build_gateway_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/chat", post(chat))
        .with_state(app_state)
}

/// Orchestrated research session
pub fn build_research_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/research", post(submit_research))
        .route("/research/sections", get(list_sections))
        .route("/research/messages", get(list_messages))
        .route("/research/active", delete(cancel_research))
        .with_state(app_state)
}

pub fn build_health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Build OpenAPI documentation routes
pub fn build_openapi_routes() -> Router {
    Router::new().route("/docs", get(swagger_ui_handler)).route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

/// Serve Swagger UI HTML page
async fn swagger_ui_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Research Assistant API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.10.5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.10.5/swagger-ui-bundle.js"></script>
    <script>
    window.onload = function() {
        SwaggerUIBundle({
            url: '/api-docs/openapi.json',
            dom_id: '#swagger-ui',
            deepLinking: true,
            docExpansion: 'list',
        });
    };
    </script>
</body>
</html>"#,
    )
}
