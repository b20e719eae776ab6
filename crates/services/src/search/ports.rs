use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Title of the synthetic entry built from the provider's direct answer
pub const ANSWER_RESULT_TITLE: &str = "AI Generated Answer";
/// Placeholder url of the synthetic answer entry
pub const ANSWER_RESULT_URL: &str = "Generated from Tavily's answer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One web source returned by the search provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Image correlated to this result by position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<SearchImage>,
}

impl SearchResult {
    /// The entry prepended to the results when the provider returned an answer
    pub fn from_answer(answer: &str) -> Self {
        Self {
            title: ANSWER_RESULT_TITLE.to_string(),
            content: answer.to_string(),
            url: ANSWER_RESULT_URL.to_string(),
            snippet: None,
            score: None,
            image: None,
        }
    }

    pub fn is_answer(&self) -> bool {
        self.title == ANSWER_RESULT_TITLE && self.url == ANSWER_RESULT_URL
    }
}

/// Normalized search response.
///
/// When `answer` is set, `results[0]` is the synthetic answer entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<SearchImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Parameters for web search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    /// The user's search query (required)
    pub query: String,
    /// Ask the provider for images related to the query
    pub include_images: bool,
    /// Ask the provider to describe each returned image
    pub include_image_descriptions: bool,
}

impl SearchParams {
    /// Create a new SearchParams with just a query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_images(mut self, include_descriptions: bool) -> Self {
        self.include_images = true;
        self.include_image_descriptions = include_descriptions;
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Search provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("Invalid response format from search provider: {0}")]
    Format(String),
    #[error("Search request failed: {0}")]
    RequestFailed(String),
    #[error("Search request was cancelled")]
    Cancelled,
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Upstream { message, .. } => message.clone(),
            Self::Format(_) => "Invalid response format from search provider".to_string(),
            Self::RequestFailed(_) => "Failed to reach the search provider".to_string(),
            Self::Cancelled => "Search was cancelled".to_string(),
        }
    }
}

/// Search Gateway port
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait SearchProviderTrait: Send + Sync {
    /// Run one search. Cancelling `cancel` aborts the in-flight request with
    /// `SearchError::Cancelled`.
    async fn search(
        &self,
        params: SearchParams,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError>;
}
