use inference_providers::CompletionError;
use thiserror::Error;

use crate::search::SearchError;

#[derive(Debug, Clone, Error)]
pub enum ResearchError {
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("Research was cancelled")]
    Cancelled,
    #[error("Research task failed: {0}")]
    TaskFailed(String),
}

impl ResearchError {
    /// Aborts are expected and never shown to the user
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Search(e) => e.is_cancelled(),
            Self::Completion(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Short summary recorded on the section
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyQuery => "Please enter a query".to_string(),
            Self::Search(e) => e.user_message(),
            Self::Completion(CompletionError::HttpError { status_code, .. }) => {
                format!("The language model request failed (HTTP {status_code})")
            }
            Self::Completion(CompletionError::NoBody) => {
                "The language model returned an empty response".to_string()
            }
            Self::Completion(CompletionError::StreamError(_)) => {
                "The report stream was interrupted".to_string()
            }
            Self::Completion(_) => "Failed to generate the report".to_string(),
            Self::Cancelled => "Research was cancelled".to_string(),
            Self::TaskFailed(_) => "Something went wrong, please try again".to_string(),
        }
    }
}
