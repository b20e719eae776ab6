//! OpenAI-compatible streaming completion provider
//!
//! Talks to any provider exposing `POST {base_url}/chat/completions` with
//! server-sent-event streaming (OpenRouter by default). The raw event stream is
//! handed to the SSE parser, which reassembles it into JSON frames.

use crate::{
    sse_parser::new_sse_parser, ChatCompletionParams, ChatMessage, CompletionError,
    InferenceProvider, StreamingResult,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header::HeaderValue, Client};
use tokio_util::sync::CancellationToken;

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    /// Base URL for the provider API, without the `/chat/completions` suffix
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f32,
    /// Maximum silence between two body reads
    pub timeout_seconds: u64,
}

pub struct OpenAiCompatibleProvider {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .read_timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                CompletionError::RequestFailed(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    fn build_headers(&self) -> Result<reqwest::header::HeaderMap, String> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("text/event-stream"));

        let auth_value = format!("Bearer {}", self.config.api_key);
        let header_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| format!("Invalid API key format: {e}"))?;
        headers.insert("Authorization", header_value);

        Ok(headers)
    }

    fn build_params(&self, messages: Vec<ChatMessage>) -> ChatCompletionParams {
        ChatCompletionParams {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(true),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl InferenceProvider for OpenAiCompatibleProvider {
    async fn chat_completion_stream(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<StreamingResult, CompletionError> {
        let params = self.build_params(messages);
        let headers = self
            .build_headers()
            .map_err(CompletionError::RequestFailed)?;

        tracing::debug!(
            model = %params.model,
            messages = params.messages.len(),
            "Opening completion stream"
        );

        let request = self
            .client
            .post(self.completions_url())
            .headers(headers)
            .json(&params)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            result = request => result.map_err(|e| CompletionError::RequestFailed(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            // Error bodies are not guaranteed to be JSON
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response body: {e}"));
            tracing::error!(
                status = status.as_u16(),
                status_text = status.canonical_reason().unwrap_or(""),
                body = %error_text,
                "Completion provider returned an error"
            );
            return Err(CompletionError::HttpError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        if response.content_length() == Some(0) {
            return Err(CompletionError::NoBody);
        }

        let frames = new_sse_parser(response.bytes_stream())
            .take_until(cancel.clone().cancelled_owned());
        Ok(Box::pin(frames))
    }
}
