//! Mock implementation of InferenceProvider for testing
//!
//! Responses are rendered to the same event-stream bytes a real provider
//! sends, cut into small chunks, and run through the real SSE parser, so tests
//! exercise reassembly without a network.

use crate::{
    sse_parser::new_sse_parser, ChatMessage, CompletionError, InferenceProvider, StreamingResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Template for generating one streamed response
#[derive(Clone, Debug)]
pub struct ResponseTemplate {
    content: String,
    reasoning: Option<String>,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    /// Fail the request before any bytes are streamed
    error: Option<CompletionError>,
    /// Simulate a transport failure after N byte chunks
    disconnect_after_chunks: Option<usize>,
}

impl ResponseTemplate {
    /// Create a new response template with the given content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning: None,
            chunk_size: 7,
            chunk_delay: None,
            error: None,
            disconnect_after_chunks: None,
        }
    }

    /// Create a template whose request fails up front
    pub fn failing(error: CompletionError) -> Self {
        Self {
            error: Some(error),
            ..Self::new("")
        }
    }

    /// Set reasoning content streamed before the answer
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Size of the byte chunks the payload is cut into
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Pause before every byte chunk
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Simulate a dropped connection after N byte chunks
    pub fn with_disconnect_after(mut self, chunks: usize) -> Self {
        self.disconnect_after_chunks = Some(chunks);
        self
    }

    /// Render the complete event-stream payload: reasoning word by word, then
    /// content word by word, a usage frame, and the end marker.
    pub fn sse_payload(&self) -> String {
        let mut payload = String::from(": OPENROUTER PROCESSING\n\n");
        let mut tokens = 0;

        let mut push_words = |field: &str, text: &str, payload: &mut String| {
            for (i, word) in text.split(' ').enumerate() {
                let piece = if i == 0 {
                    word.to_string()
                } else {
                    format!(" {word}")
                };
                tokens += 1;
                let mut delta = serde_json::Map::new();
                delta.insert("role".to_string(), "assistant".into());
                delta.insert(field.to_string(), piece.into());
                let frame = serde_json::json!({
                    "id": "gen-mock",
                    "object": "chat.completion.chunk",
                    "model": "mock-model",
                    "choices": [{ "index": 0, "delta": delta, "finish_reason": null }]
                });
                payload.push_str(&format!("data: {frame}\n\n"));
            }
        };

        if let Some(reasoning) = &self.reasoning {
            push_words("reasoning", reasoning, &mut payload);
        }
        if !self.content.is_empty() {
            push_words("content", &self.content, &mut payload);
        }

        let usage = serde_json::json!({
            "id": "gen-mock",
            "object": "chat.completion.chunk",
            "model": "mock-model",
            "choices": [{ "index": 0, "delta": { "content": "" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": tokens, "total_tokens": 10 + tokens }
        });
        payload.push_str(&format!("data: {usage}\n\ndata: [DONE]\n\n"));
        payload
    }

    fn byte_chunks(&self) -> Vec<Result<Bytes, String>> {
        let payload = self.sse_payload();
        let mut chunks: Vec<Result<Bytes, String>> = payload
            .as_bytes()
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        if let Some(limit) = self.disconnect_after_chunks {
            chunks.truncate(limit);
            chunks.push(Err("connection reset by peer".to_string()));
        }
        chunks
    }
}

/// Mock inference provider returning scripted streams.
///
/// Templates are consumed in order; the last one is reused once the queue is
/// down to a single entry.
#[derive(Clone)]
pub struct MockProvider {
    templates: Arc<Mutex<VecDeque<ResponseTemplate>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockProvider {
    pub fn new(template: ResponseTemplate) -> Self {
        Self::with_templates(vec![template])
    }

    pub fn with_templates(templates: Vec<ResponseTemplate>) -> Self {
        Self {
            templates: Arc::new(Mutex::new(templates.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Message lists of every request received so far
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_template(&self) -> ResponseTemplate {
        let mut templates = match self.templates.lock() {
            Ok(templates) => templates,
            Err(poisoned) => poisoned.into_inner(),
        };
        if templates.len() > 1 {
            templates.pop_front().unwrap_or_else(|| ResponseTemplate::new(""))
        } else {
            templates
                .front()
                .cloned()
                .unwrap_or_else(|| ResponseTemplate::new(""))
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(
            ResponseTemplate::new("This is a mock research report.")
                .with_reasoning("Reviewing the sources."),
        )
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    async fn chat_completion_stream(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<StreamingResult, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages);
        }

        let template = self.next_template();
        if let Some(error) = template.error.clone() {
            return Err(error);
        }
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }

        let delay = template.chunk_delay;
        let bytes = stream::iter(template.byte_chunks()).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            chunk
        });

        let frames = new_sse_parser(Box::pin(bytes)).take_until(cancel.clone().cancelled_owned());
        Ok(Box::pin(frames))
    }
}
