use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Parameters for chat completion requests (OpenAI wire format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionParams {
    /// Model ID to use for the completion
    pub model: String,

    /// Messages in the exact order they are sent upstream
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,

    /// Sampling temperature between 0 and 2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Whether to stream back partial progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatCompletionParams {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            stream: None,
        }
    }
}

/// Delta message in streaming chat completions
///
/// Reasoning models report their trace either as `reasoning` (OpenRouter) or
/// `reasoning_content` (DeepSeek, vLLM).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

/// Choice in a streamed chat completion chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: i64,

    /// Incremental message delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChatDelta>,

    /// Reason why generation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

/// Chat completion streaming chunk
///
/// Only the fields the research flow reads are typed; identifiers are lenient
/// because OpenAI-compatible providers disagree on which ones they send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Usage statistics (typically only in final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// The text fragment carried by one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDelta<'a> {
    Reasoning(&'a str),
    Content(&'a str),
}

/// One JSON object reassembled from the upstream event stream.
///
/// The full object is kept so it can be forwarded unchanged; the delta
/// accessors give the typed view the consumer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamFrame {
    value: serde_json::Value,
}

impl StreamFrame {
    /// Parse one data payload. Only JSON objects are frames.
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(data)?;
        Ok(Self {
            value: serde_json::Value::Object(map),
        })
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Typed view of the frame as a chat completion chunk
    pub fn chunk(&self) -> Option<ChatCompletionChunk> {
        ChatCompletionChunk::deserialize(&self.value).ok()
    }

    /// The delta of the first choice. Reasoning and content are mutually
    /// exclusive: when both are present reasoning wins. Empty strings count as
    /// absent.
    pub fn delta(&self) -> Option<FrameDelta<'_>> {
        let delta = self.value.pointer("/choices/0/delta")?;
        let text = |key: &str| {
            delta
                .get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
        };

        if let Some(reasoning) = text("reasoning").or_else(|| text("reasoning_content")) {
            return Some(FrameDelta::Reasoning(reasoning));
        }
        text("content").map(FrameDelta::Content)
    }

    /// Compact JSON followed by a newline, one object per line
    pub fn to_ndjson(&self) -> Bytes {
        let mut line = self.value.to_string();
        line.push('\n');
        Bytes::from(line)
    }
}

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum CompletionError {
    #[error("Completion provider returned HTTP {status_code}: {message}")]
    HttpError { status_code: u16, message: String },
    #[error("Completion provider returned no response body")]
    NoBody,
    #[error("Failed to perform completion: {0}")]
    RequestFailed(String),
    #[error("Completion stream failed: {0}")]
    StreamError(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("Completion request was cancelled")]
    Cancelled,
}

impl CompletionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
