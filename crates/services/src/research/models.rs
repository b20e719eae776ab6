use chrono::{DateTime, Utc};
use inference_providers::ChatMessage;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::search::{SearchResponse, SearchResult};

/// Where one research turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SectionPhase {
    /// Waiting for the search provider
    Searching,
    /// Sources are in, no model output yet
    Thinking,
    /// Model output is arriving
    Streaming,
    Done,
    Error,
    Cancelled,
}

impl SectionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

/// One query-response turn as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatSection {
    pub id: Uuid,
    pub query: String,
    pub search_results: Vec<SearchResult>,
    pub reasoning: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub phase: SectionPhase,
    pub reasoning_collapsed: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatSection {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            search_results: Vec::new(),
            reasoning: String::new(),
            response: String::new(),
            error: None,
            phase: SectionPhase::Searching,
            reasoning_collapsed: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_loading_sources(&self) -> bool {
        self.phase == SectionPhase::Searching
    }

    pub fn is_loading_thinking(&self) -> bool {
        matches!(self.phase, SectionPhase::Searching | SectionPhase::Thinking)
    }

    pub fn sources_loaded(&mut self, results: Vec<SearchResult>) {
        self.search_results = results;
        self.phase = SectionPhase::Thinking;
    }

    pub fn complete(&mut self) {
        self.phase = SectionPhase::Done;
    }

    /// Record a failure. Whatever was already accumulated is kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.phase = SectionPhase::Error;
    }

    /// Drop partial state. A cancelled turn carries no error.
    pub fn cancel(&mut self) {
        self.search_results.clear();
        self.reasoning.clear();
        self.response.clear();
        self.error = None;
        self.phase = SectionPhase::Cancelled;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Transcript entry. Assistant messages carry everything needed to audit how
/// the answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_search_response: Option<SearchResponse>,
    /// The exact prompt sent to the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_input: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            search_results: None,
            full_search_response: None,
            reasoning_input: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(content)
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        match message.role {
            Role::User => ChatMessage::user(message.content.clone()),
            Role::Assistant => ChatMessage::assistant(message.content.clone()),
        }
    }
}
