//! Client stream consumer
//!
//! Folds reassembled frames into the two accumulating text fields of a
//! [`ChatSection`]. It works either on frames straight from a provider or on
//! the newline-delimited JSON body the chat endpoint emits.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use inference_providers::{CompletionError, FrameDelta, StreamFrame};
use std::fmt::Display;

use super::models::{ChatSection, SectionPhase};

/// What one frame did to the section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEffect {
    Reasoning,
    Content,
    Ignored,
}

pub struct StreamConsumer {
    section: ChatSection,
    frames_applied: usize,
}

impl StreamConsumer {
    pub fn new(section: ChatSection) -> Self {
        Self {
            section,
            frames_applied: 0,
        }
    }

    pub fn section(&self) -> &ChatSection {
        &self.section
    }

    pub fn section_mut(&mut self) -> &mut ChatSection {
        &mut self.section
    }

    pub fn into_section(self) -> ChatSection {
        self.section
    }

    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }

    /// Append the frame's delta to the matching field. The first token of
    /// either kind ends the thinking phase; the first answer token collapses
    /// the reasoning trace.
    pub fn apply_frame(&mut self, frame: &StreamFrame) -> FrameEffect {
        let effect = match frame.delta() {
            Some(FrameDelta::Reasoning(text)) => {
                self.section.reasoning.push_str(text);
                FrameEffect::Reasoning
            }
            Some(FrameDelta::Content(text)) => {
                if self.section.response.is_empty() {
                    self.section.reasoning_collapsed = true;
                }
                self.section.response.push_str(text);
                FrameEffect::Content
            }
            None => {
                tracing::debug!("Frame carries no reasoning or content, ignoring");
                return FrameEffect::Ignored;
            }
        };

        if self.section.phase == SectionPhase::Thinking {
            self.section.phase = SectionPhase::Streaming;
        }
        self.frames_applied += 1;
        effect
    }

    /// Apply one line of newline-delimited JSON
    pub fn apply_line(&mut self, line: &str) -> FrameEffect {
        let line = line.trim();
        if line.is_empty() {
            return FrameEffect::Ignored;
        }
        match StreamFrame::parse(line) {
            Ok(frame) => self.apply_frame(&frame),
            Err(e) => {
                tracing::warn!(error = %e, line_len = line.len(), "Dropping unparsable stream line");
                FrameEffect::Ignored
            }
        }
    }

    /// Consume provider frames until the stream ends, calling `on_update`
    /// after every frame that changed the section.
    pub async fn consume_frames<S, F>(
        &mut self,
        mut frames: S,
        mut on_update: F,
    ) -> Result<(), CompletionError>
    where
        S: Stream<Item = Result<StreamFrame, CompletionError>> + Unpin,
        F: FnMut(&ChatSection),
    {
        while let Some(frame) = frames.next().await {
            if self.apply_frame(&frame?) != FrameEffect::Ignored {
                on_update(&self.section);
            }
        }
        Ok(())
    }

    /// Consume a newline-delimited JSON byte stream. Lines may be split
    /// anywhere across chunks; a final unterminated line is applied at the end.
    pub async fn consume_ndjson<S, E, F>(
        &mut self,
        mut body: S,
        mut on_update: F,
    ) -> Result<(), CompletionError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
        F: FnMut(&ChatSection),
    {
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CompletionError::StreamError(e.to_string()))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if self.apply_line(&String::from_utf8_lossy(&line)) != FrameEffect::Ignored {
                    on_update(&self.section);
                }
            }
        }

        if !buffer.is_empty()
            && self.apply_line(&String::from_utf8_lossy(&buffer)) != FrameEffect::Ignored
        {
            on_update(&self.section);
        }
        Ok(())
    }
}
