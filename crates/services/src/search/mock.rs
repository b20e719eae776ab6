//! Scripted search provider for tests

use super::ports::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returns scripted outcomes in order, reusing the last one. An optional delay
/// keeps the search in flight long enough to be cancelled.
#[derive(Clone)]
pub struct MockSearchProvider {
    outcomes: Arc<Mutex<VecDeque<Result<SearchResponse, SearchError>>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<SearchParams>>>,
}

impl MockSearchProvider {
    pub fn new(response: SearchResponse) -> Self {
        Self::with_outcomes(vec![Ok(response)])
    }

    pub fn failing(error: SearchError) -> Self {
        Self::with_outcomes(vec![Err(error)])
    }

    pub fn with_outcomes(outcomes: Vec<Result<SearchResponse, SearchError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Parameters of every search received so far
    pub fn calls(&self) -> Vec<SearchParams> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// A normalized response with an answer entry and two sources
    pub fn sample_response(query: &str) -> SearchResponse {
        let answer = format!("A short answer about {query}.");
        SearchResponse {
            results: vec![
                SearchResult::from_answer(&answer),
                SearchResult {
                    title: "The Rust Programming Language".to_string(),
                    content: "Rust is a multi-paradigm, general-purpose language.".to_string(),
                    url: "https://doc.rust-lang.org/book/".to_string(),
                    snippet: None,
                    score: Some(0.92),
                    image: None,
                },
                SearchResult {
                    title: "Rust (programming language) - Wikipedia".to_string(),
                    content: "Rust emphasizes performance, type safety, and concurrency."
                        .to_string(),
                    url: "https://en.wikipedia.org/wiki/Rust_(programming_language)".to_string(),
                    snippet: None,
                    score: Some(0.87),
                    image: None,
                },
            ],
            images: None,
            answer: Some(answer),
            query: Some(query.to_string()),
        }
    }

    fn next_outcome(&self) -> Result<SearchResponse, SearchError> {
        let mut outcomes = match self.outcomes.lock() {
            Ok(outcomes) => outcomes,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = if outcomes.len() > 1 {
            outcomes.pop_front()
        } else {
            outcomes.front().cloned()
        };
        next.unwrap_or_else(|| Ok(SearchResponse::default()))
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new(Self::sample_response("rust"))
    }
}

#[async_trait]
impl SearchProviderTrait for MockSearchProvider {
    async fn search(
        &self,
        params: SearchParams,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(params);
        }
        let outcome = self.next_outcome();

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SearchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        outcome
    }
}
