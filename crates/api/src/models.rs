use serde::{Deserialize, Serialize};
use services::research::{ChatSection, Message};
use utoipa::ToSchema;

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Request body for `POST /api/search`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, alias = "includeImages")]
    pub include_images: bool,
    #[serde(default, alias = "includeImageDescriptions")]
    pub include_image_descriptions: bool,
}

impl SearchRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query is required".to_string());
        }
        Ok(())
    }
}

/// Request body for `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Sent upstream in this exact order
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request body for `POST /v1/research`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    pub query: String,
}

/// A section snapshot with its derived loading indicators
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SectionResponse {
    #[serde(flatten)]
    pub section: ChatSection,
    pub is_loading_sources: bool,
    pub is_loading_thinking: bool,
}

impl From<ChatSection> for SectionResponse {
    fn from(section: ChatSection) -> Self {
        Self {
            is_loading_sources: section.is_loading_sources(),
            is_loading_thinking: section.is_loading_thinking(),
            section,
        }
    }
}
