pub use super::ports::*;
use config::SearchProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FALLBACK_ERROR_MESSAGE: &str = "Failed to get response from search provider";

pub struct TavilySearchProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearchProvider {
    pub fn new(config: &SearchProviderConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| SearchError::RequestFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn search_post_builder(&self) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }
}

/// Request body of the Tavily search API
#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    include_images: bool,
    include_image_descriptions: bool,
}

/// Root response from the Tavily search API
#[derive(Debug, Clone, Deserialize)]
pub struct TavilyResponse {
    #[serde(default)]
    pub results: Option<Vec<TavilyResult>>,
    #[serde(default)]
    pub images: Option<Vec<TavilyImage>>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TavilyResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Images come back as bare urls, or as objects once descriptions are requested
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TavilyImage {
    Url(String),
    Described {
        url: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<TavilyImage> for SearchImage {
    fn from(image: TavilyImage) -> Self {
        match image {
            TavilyImage::Url(url) => SearchImage {
                url,
                description: None,
            },
            TavilyImage::Described { url, description } => SearchImage { url, description },
        }
    }
}

/// Turn a provider response into a `SearchResponse`.
///
/// Images are attached to results by position, before the answer entry is
/// prepended. The provider does not promise that order, so a count mismatch is
/// logged.
pub fn normalize(response: TavilyResponse) -> Result<SearchResponse, SearchError> {
    let Some(raw_results) = response.results else {
        tracing::error!(query = ?response.query, "Search response is missing results");
        return Err(SearchError::Format(
            "response has no results field".to_string(),
        ));
    };

    let images: Option<Vec<SearchImage>> = response
        .images
        .map(|images| images.into_iter().map(SearchImage::from).collect());

    let mut results: Vec<SearchResult> = raw_results
        .into_iter()
        .map(|result| SearchResult {
            title: result.title,
            content: result.content,
            url: result.url,
            snippet: None,
            score: result.score,
            image: None,
        })
        .collect();

    if let Some(images) = images.as_ref().filter(|images| !images.is_empty()) {
        if images.len() != results.len() {
            tracing::warn!(
                images = images.len(),
                results = results.len(),
                "Image count differs from result count; positional image correlation is unreliable"
            );
        }
        for (result, image) in results.iter_mut().zip(images) {
            result.image = Some(image.clone());
        }
    }

    let answer = response.answer.filter(|answer| !answer.is_empty());
    if let Some(answer) = &answer {
        results.insert(0, SearchResult::from_answer(answer));
    }

    Ok(SearchResponse {
        results,
        images,
        answer,
        query: response.query,
    })
}

/// Pull a readable message out of an error body, which may not be JSON
fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return FALLBACK_ERROR_MESSAGE.to_string();
    };

    ["/message", "/error", "/detail/error", "/detail"]
        .iter()
        .find_map(|pointer| {
            value
                .pointer(pointer)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or(FALLBACK_ERROR_MESSAGE)
        .to_string()
}

#[async_trait::async_trait]
impl SearchProviderTrait for TavilySearchProvider {
    async fn search(
        &self,
        params: SearchParams,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, SearchError> {
        tracing::debug!("Searching for query: {}", params.query);
        let body = TavilySearchRequest {
            api_key: &self.api_key,
            query: &params.query,
            search_depth: "advanced",
            include_answer: true,
            include_images: params.include_images,
            include_image_descriptions: params.include_image_descriptions,
        };

        let request = async {
            let response = self
                .search_post_builder()
                .json(&body)
                .send()
                .await
                .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

            if !status.is_success() {
                tracing::error!(
                    status = status.as_u16(),
                    status_text = status.canonical_reason().unwrap_or(""),
                    body = %response_text,
                    "Search provider returned an error"
                );
                return Err(SearchError::Upstream {
                    status: status.as_u16(),
                    message: extract_error_message(&response_text),
                });
            }

            let tavily_response: TavilyResponse =
                serde_json::from_str(&response_text).map_err(|e| {
                    tracing::error!("Failed to parse search response: {}", e);
                    SearchError::Format(format!("JSON parsing error: {e}"))
                })?;
            normalize(tavily_response)
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(SearchError::Cancelled),
            result = request => result?,
        };

        tracing::debug!("Found {} results", response.results.len());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider_for(server: &MockServer) -> TavilySearchProvider {
        TavilySearchProvider::new(&SearchProviderConfig {
            base_url: server.base_url(),
            api_key: "tvly-test".to_string(),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    fn parse(json: &str) -> TavilyResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_prepends_answer_after_image_correlation() {
        let response = normalize(parse(
            r#"{
                "query": "rust",
                "answer": "Rust is a language.",
                "results": [
                    {"title": "A", "content": "a", "url": "https://a.example", "score": 0.9},
                    {"title": "B", "content": "b", "url": "https://b.example"}
                ],
                "images": [
                    "https://img.example/1.png",
                    {"url": "https://img.example/2.png", "description": "second"}
                ]
            }"#,
        ))
        .unwrap();

        assert_eq!(response.results.len(), 3);
        assert!(response.results[0].is_answer());
        assert_eq!(response.results[0].content, "Rust is a language.");
        assert_eq!(response.results[0].image, None);
        assert_eq!(
            response.results[1].image.as_ref().unwrap().url,
            "https://img.example/1.png"
        );
        assert_eq!(
            response.results[2].image.as_ref().unwrap().description.as_deref(),
            Some("second")
        );
        assert_eq!(response.results[1].score, Some(0.9));
    }

    #[test]
    fn test_normalize_without_answer() {
        let response = normalize(parse(
            r#"{"results": [{"title": "A", "content": "a", "url": "u"}], "answer": ""}"#,
        ))
        .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.answer, None);
        assert!(!response.results[0].is_answer());
    }

    #[test]
    fn test_normalize_mismatched_images_correlates_shorter_length() {
        let response = normalize(parse(
            r#"{"results": [
                    {"title": "A", "content": "a", "url": "u1"},
                    {"title": "B", "content": "b", "url": "u2"}
                ],
                "images": ["https://img.example/only.png"]}"#,
        ))
        .unwrap();

        assert!(response.results[0].image.is_some());
        assert!(response.results[1].image.is_none());
    }

    #[test]
    fn test_normalize_missing_results_is_format_error() {
        let result = normalize(parse(r#"{"answer": "x"}"#));
        assert!(matches!(result, Err(SearchError::Format(_))));
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(extract_error_message(r#"{"message":"Bad key"}"#), "Bad key");
        assert_eq!(
            extract_error_message(r#"{"detail":{"error":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(extract_error_message(r#"{"detail":"Too many"}"#), "Too many");
        assert_eq!(
            extract_error_message("<html>bad gateway</html>"),
            FALLBACK_ERROR_MESSAGE
        );
        assert_eq!(extract_error_message("{}"), FALLBACK_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_search_sends_expected_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/search")
                    .header("Authorization", "Bearer tvly-test")
                    .json_body_partial(
                        r#"{"query":"rust async","search_depth":"advanced","include_answer":true,"include_images":true,"include_image_descriptions":false}"#,
                    );
                then.status(200).json_body(serde_json::json!({
                    "query": "rust async",
                    "answer": "Futures.",
                    "results": [{"title": "Async book", "content": "...", "url": "https://rust-lang.github.io/async-book/"}]
                }));
            })
            .await;

        let provider = provider_for(&server);
        let response = provider
            .search(
                SearchParams::new("rust async").with_images(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.answer.as_deref(), Some("Futures."));
    }

    #[tokio::test]
    async fn test_search_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(401)
                    .json_body(serde_json::json!({"detail": {"error": "Unauthorized: missing or invalid API key."}}));
            })
            .await;

        let result = provider_for(&server)
            .search(SearchParams::new("q"), &CancellationToken::new())
            .await;

        match result {
            Err(SearchError::Upstream { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized: missing or invalid API key.");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_cancelled() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/search");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .json_body(serde_json::json!({"results": []}));
            })
            .await;

        let cancel = CancellationToken::new();
        let provider = provider_for(&server);
        let search = provider.search(SearchParams::new("q"), &cancel);
        cancel.cancel();

        assert!(matches!(search.await, Err(SearchError::Cancelled)));
    }
}
