//! Inference providers crate for streaming chat completions
//!
//! This crate opens a streaming request to a chat completion provider and
//! turns the provider's server-sent-event byte stream into a lazy sequence of
//! reassembled JSON frames.
//!
//! # Streaming-First Design
//!
//! The only completion method returns a stream. Frames arrive as soon as the
//! upstream sends them; the stream is finite and not restartable (issue a new
//! request to retry). Cancellation is cooperative: the caller's
//! [`CancellationToken`] ends the stream at its next suspension point and the
//! upstream connection is released when the stream is dropped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use inference_providers::{ChatMessage, FrameDelta, InferenceProvider};
//! use futures_util::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example<P: InferenceProvider>(provider: P) {
//!     let cancel = CancellationToken::new();
//!     let messages = vec![ChatMessage::user("What is a monad?")];
//!
//!     let mut stream = provider.chat_completion_stream(messages, &cancel).await?;
//!     while let Some(frame) = stream.next().await {
//!         match frame?.delta() {
//!             Some(FrameDelta::Reasoning(text)) => eprint!("{text}"),
//!             Some(FrameDelta::Content(text)) => print!("{text}"),
//!             None => {}
//!         }
//!     }
//! }
//! ```

pub mod mock;
pub mod models;
pub mod openai_compatible;
pub mod sse_parser;

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio_util::sync::CancellationToken;

// Re-export commonly used types for convenience
pub use mock::{MockProvider, ResponseTemplate};
pub use models::{
    ChatChoice, ChatCompletionChunk, ChatCompletionParams, ChatDelta, ChatMessage,
    CompletionError, FrameDelta, MessageRole, StreamFrame, TokenUsage,
};
pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
pub use sse_parser::{FrameReassembler, SSEParser};

/// Type alias for streaming completion results
///
/// Each item is one reassembled frame. A transport failure is reported as a
/// single `Err` item after which the stream ends; frames yielded before it
/// remain valid.
pub type StreamingResult = Pin<Box<dyn Stream<Item = Result<StreamFrame, CompletionError>> + Send>>;

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Performs a streaming chat completion request
    ///
    /// `messages` are sent upstream in exactly the given order. Fails with
    /// `HttpError` (raw body text) on a non-success status, `NoBody` when the
    /// success response has no body, and `Cancelled` if `cancel` fires before
    /// the response arrives.
    async fn chat_completion_stream(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<StreamingResult, CompletionError>;
}
