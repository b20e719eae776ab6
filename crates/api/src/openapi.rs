use crate::models::*;
use crate::routes::health::HealthResponse;
use services::research::{ChatSection, Message, Role, SectionPhase};
use services::search::{SearchImage, SearchResponse, SearchResult};
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Research Assistant API",
        description = "Web search plus streamed LLM research reports.\n\n`/api/*` endpoints are stateless gateways to the search and completion providers. `/v1/research` runs the full search, prompt and report flow for a single in-process session, where a new submission cancels the one in flight.",
        version = "1.0.0",
        license(
            name = "MIT",
        )
    ),
    paths(
        crate::routes::search::search,
        crate::routes::chat::chat,
        crate::routes::research::submit_research,
        crate::routes::research::list_sections,
        crate::routes::research::list_messages,
        crate::routes::research::cancel_research,
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            ErrorResponse, SearchRequest, ChatRequest, ResearchRequest, SectionResponse,
            HealthResponse,
            SearchResponse, SearchResult, SearchImage,
            ChatSection, SectionPhase, Message, Role,
        ),
    ),
    tags(
        (name = "Search", description = "Web search gateway"),
        (name = "Chat", description = "Streaming completion gateway"),
        (name = "Research", description = "Orchestrated research session"),
        (name = "Health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
