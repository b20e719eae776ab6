use crate::{CompletionError, StreamFrame};
use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Logical end-of-stream marker sent by OpenAI-compatible providers
pub const DONE_SENTINEL: &str = "[DONE]";

/// A partial object spanning more lines than this is abandoned
pub const MAX_PENDING_LINES: usize = 16;

/// A partial object larger than this is abandoned
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// A single line longer than this is dropped
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Text of an object whose closing brace has not arrived yet
#[derive(Debug)]
struct PendingObject {
    text: String,
    lines: usize,
}

impl PendingObject {
    fn exceeds_limits(&self) -> bool {
        self.lines > MAX_PENDING_LINES || self.text.len() > MAX_PENDING_BYTES
    }
}

/// Incremental decoder from raw event-stream bytes to JSON frames.
///
/// Byte chunks may end anywhere: inside a UTF-8 sequence, inside a line, or
/// inside a JSON object spread over several lines. Only newline-terminated
/// lines are interpreted, so the frames produced depend on the bytes alone and
/// never on where the chunk boundaries fell.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    undecoded: Vec<u8>,
    buffer: String,
    pending: Option<PendingObject>,
    /// Set while the rest of an over-long line is being skipped
    skipping_line: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completes, in order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        let text = self.decode(bytes);
        self.buffer.push_str(&text);

        let mut frames = Vec::new();
        let buffer = std::mem::take(&mut self.buffer);
        let mut start = 0;
        while let Some(offset) = buffer[start..].find('\n') {
            let end = start + offset;
            if std::mem::take(&mut self.skipping_line) {
                tracing::warn!("Dropped event-stream line exceeding size limit");
            } else if end - start > MAX_LINE_BYTES {
                tracing::warn!(bytes = end - start, "Dropped event-stream line exceeding size limit");
            } else {
                self.process_line(&buffer[start..end], &mut frames);
            }
            start = end + 1;
        }
        self.buffer = buffer;
        self.buffer.drain(..start);

        if self.skipping_line {
            self.buffer.clear();
        } else if self.buffer.len() > MAX_LINE_BYTES {
            self.buffer.clear();
            self.skipping_line = true;
        }
        frames
    }

    /// Flush at end of stream. The unterminated tail gets one last parse
    /// attempt; an incomplete trailing fragment is discarded without error.
    pub fn finish(&mut self) -> Vec<StreamFrame> {
        let mut frames = Vec::new();

        if !self.undecoded.is_empty() {
            let rest = std::mem::take(&mut self.undecoded);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }

        let tail = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.skipping_line) || tail.len() > MAX_LINE_BYTES {
            tracing::warn!("Dropped event-stream line exceeding size limit");
        } else if !tail.trim().is_empty() {
            self.process_line(&tail, &mut frames);
        }

        if let Some(pending) = self.pending.take() {
            tracing::debug!(
                bytes = pending.text.len(),
                "Discarding incomplete frame at end of stream"
            );
        }
        frames
    }

    /// Decode as much UTF-8 as possible, keeping an incomplete trailing
    /// sequence for the next chunk. Invalid sequences become U+FFFD.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.undecoded.extend_from_slice(bytes);
        let mut text = String::new();

        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(valid) => {
                    text.push_str(valid);
                    self.undecoded.clear();
                    return text;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.undecoded[..valid_up_to]));
                    match e.error_len() {
                        None => {
                            self.undecoded.drain(..valid_up_to);
                            return text;
                        }
                        Some(invalid_len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            self.undecoded.drain(..valid_up_to + invalid_len);
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, raw: &str, frames: &mut Vec<StreamFrame>) {
        let line = raw.trim();

        // Blank event separators and SSE comments (keep-alives)
        if line.is_empty() || line.starts_with(':') {
            return;
        }

        let data = strip_data_prefix(line);

        if data == DONE_SENTINEL {
            if let Some(pending) = self.pending.take() {
                tracing::warn!(
                    bytes = pending.text.len(),
                    "Dropping unparseable frame before end-of-stream marker"
                );
            }
            return;
        }

        if let Some(pending) = self.pending.take() {
            self.continue_pending(pending, data, frames);
            return;
        }

        if !data.starts_with('{') {
            tracing::debug!(line = %line, "Skipping non-JSON event-stream line");
            return;
        }

        match StreamFrame::parse(data) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                let pending = PendingObject {
                    text: data.to_string(),
                    lines: 1,
                };
                if pending.exceeds_limits() {
                    tracing::warn!(error = %e, "Dropping oversized unparseable frame");
                    return;
                }
                tracing::debug!(error = %e, "Frame incomplete, waiting for more data");
                self.pending = Some(pending);
            }
        }
    }

    /// Join a following line onto a partial object and retry the parse
    fn continue_pending(
        &mut self,
        mut pending: PendingObject,
        data: &str,
        frames: &mut Vec<StreamFrame>,
    ) {
        pending.text.push('\n');
        pending.text.push_str(data);
        pending.lines += 1;

        if let Ok(frame) = StreamFrame::parse(&pending.text) {
            frames.push(frame);
            return;
        }

        // A complete object on its own line means the partial was malformed
        // rather than split; drop it instead of stalling behind it.
        if data.starts_with('{') {
            if let Ok(frame) = StreamFrame::parse(data) {
                tracing::warn!(
                    lines = pending.lines - 1,
                    "Dropping unparseable frame superseded by a complete one"
                );
                frames.push(frame);
                return;
            }
        }

        if pending.exceeds_limits() {
            tracing::warn!(
                lines = pending.lines,
                bytes = pending.text.len(),
                "Dropping unparseable frame after exceeding re-buffer limits"
            );
            return;
        }

        self.pending = Some(pending);
    }
}

fn strip_data_prefix(line: &str) -> &str {
    match line.strip_prefix("data:") {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim(),
        None => line,
    }
}

/// SSE (Server-Sent Events) stream parser that turns an upstream byte stream
/// into a stream of reassembled frames
pub struct SSEParser<S> {
    inner: S,
    reassembler: FrameReassembler,
    ready: VecDeque<StreamFrame>,
    finished: bool,
}

impl<S> SSEParser<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            reassembler: FrameReassembler::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }
}

pub fn new_sse_parser<S>(stream: S) -> SSEParser<S> {
    SSEParser::new(stream)
}

impl<S, E> Stream for SSEParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<StreamFrame, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.ready.extend(this.reassembler.push(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    tracing::error!(error = %e, "Upstream completion stream failed");
                    return Poll::Ready(Some(Err(CompletionError::StreamError(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.ready.extend(this.reassembler.finish());
                    this.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    const PAYLOAD: &str = concat!(
        ": OPENROUTER PROCESSING\n",
        "\n",
        "data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\",\"reasoning\":\"Thinking about caf\u{e9}\"}}]}\n",
        "\n",
        "data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello \u{1F30D}\"}}]}\r\n",
        "\r\n",
        "data: {\"id\":\"gen-1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\n",
        "data: \"finish_reason\":\"stop\"}]}\n",
        "\n",
        "data:{\"id\":\"gen-1\",\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":4,\"total_tokens\":14}}\n",
        "data: [DONE]\n",
    );

    fn reassemble(chunks: &[&[u8]]) -> Vec<serde_json::Value> {
        let mut reassembler = FrameReassembler::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(reassembler.push(chunk));
        }
        frames.extend(reassembler.finish());
        frames.into_iter().map(StreamFrame::into_value).collect()
    }

    fn frame(json: &str) -> serde_json::Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_payload_frames() {
        let frames = reassemble(&[PAYLOAD.as_bytes()]);

        assert_eq!(frames.len(), 4);
        assert_eq!(
            frames[0]["choices"][0]["delta"]["reasoning"],
            "Thinking about caf\u{e9}"
        );
        assert_eq!(frames[1]["choices"][0]["delta"]["content"], "Hello \u{1F30D}");
        assert_eq!(frames[2]["choices"][0]["delta"]["content"], " world");
        assert_eq!(frames[2]["choices"][0]["finish_reason"], "stop");
        assert_eq!(frames[3]["usage"]["total_tokens"], 14);
    }

    #[test]
    fn test_chunk_boundary_invariance_every_split_point() {
        let bytes = PAYLOAD.as_bytes();
        let expected = reassemble(&[bytes]);

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(reassemble(&[a, b]), expected, "split at byte {split}");
        }
    }

    #[test]
    fn test_chunk_boundary_invariance_byte_by_byte() {
        let bytes = PAYLOAD.as_bytes();
        let expected = reassemble(&[bytes]);
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();

        assert_eq!(reassemble(&singles), expected);
    }

    #[test]
    fn test_chunk_boundary_invariance_three_way_splits() {
        let bytes = PAYLOAD.as_bytes();
        let expected = reassemble(&[bytes]);

        for first in (0..bytes.len()).step_by(7) {
            for second in (first..bytes.len()).step_by(11) {
                let chunks = [&bytes[..first], &bytes[first..second], &bytes[second..]];
                assert_eq!(reassemble(&chunks), expected, "splits at {first}/{second}");
            }
        }
    }

    #[test]
    fn test_single_data_line() {
        assert_eq!(
            reassemble(&[b"data: {\"a\":1}\n"]),
            vec![frame(r#"{"a":1}"#)]
        );
    }

    #[test]
    fn test_split_inside_object_across_reads() {
        assert_eq!(
            reassemble(&[b"data: {\"a\"", b":1}\n"]),
            vec![frame(r#"{"a":1}"#)]
        );
    }

    #[test]
    fn test_sentinel_emits_nothing() {
        assert!(reassemble(&[b"data: [DONE]\n"]).is_empty());
        assert!(reassemble(&[b"[DONE]\n\n\n"]).is_empty());
    }

    #[test]
    fn test_trailing_fragment_is_discarded() {
        assert!(reassemble(&[b"data: {\"a\""]).is_empty());
        assert_eq!(
            reassemble(&[b"data: {\"a\":1}\ndata: {\"b\""]),
            vec![frame(r#"{"a":1}"#)]
        );
    }

    #[test]
    fn test_unterminated_complete_tail_is_emitted() {
        assert_eq!(
            reassemble(&[b"data: {\"a\":1}"]),
            vec![frame(r#"{"a":1}"#)]
        );
    }

    #[test]
    fn test_object_spanning_lines_is_recovered_once() {
        let frames = reassemble(&[b"data: {\"a\":\n", b"1,\n\"b\":2}\ndata: {\"c\":3}\n"]);
        assert_eq!(frames, vec![frame(r#"{"a":1,"b":2}"#), frame(r#"{"c":3}"#)]);
    }

    #[test]
    fn test_malformed_line_does_not_stall_following_frames() {
        let frames = reassemble(&[b"data: {\"broken\"}}\ndata: {\"b\":2}\ndata: {\"c\":3}\n"]);
        assert_eq!(frames, vec![frame(r#"{"b":2}"#), frame(r#"{"c":3}"#)]);
    }

    #[test]
    fn test_pending_object_abandoned_after_line_limit() {
        let mut payload = String::from("data: {\"open\":\n");
        for _ in 0..MAX_PENDING_LINES + 1 {
            payload.push_str("data: \"noise\"\n");
        }
        payload.push_str("data: ],\n");
        payload.push_str("data: {\"after\":true}\n");

        let frames = reassemble(&[payload.as_bytes()]);
        assert_eq!(frames, vec![frame(r#"{"after":true}"#)]);
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut payload = String::new();
        for i in 0..2000 {
            payload.push_str(&format!("data: {{\"i\":{i}}}\n\n"));
        }

        let frames = reassemble(&[payload.as_bytes()]);
        assert_eq!(frames.len(), 2000);
        assert_eq!(frames[1999], frame(r#"{"i":1999}"#));
    }

    #[test]
    fn test_oversized_line_is_dropped_regardless_of_chunking() {
        let mut payload = String::from("data: {\"big\":\"");
        payload.push_str(&"x".repeat(MAX_LINE_BYTES));
        payload.push_str("\"}\ndata: {\"after\":1}\n");
        let bytes = payload.as_bytes();
        let expected = vec![frame(r#"{"after":1}"#)];

        assert_eq!(reassemble(&[bytes]), expected);
        let chunks: Vec<&[u8]> = bytes.chunks(64 * 1024).collect();
        assert_eq!(reassemble(&chunks), expected);

        // The line buffer does not grow past the limit while waiting for a newline
        let mut reassembler = FrameReassembler::new();
        for chunk in bytes[..bytes.len() - 20].chunks(64 * 1024) {
            assert!(reassembler.push(chunk).is_empty());
            assert!(reassembler.buffer.len() <= MAX_LINE_BYTES + 64 * 1024);
        }
    }

    #[test]
    fn test_sentinel_drops_pending_object() {
        let frames = reassemble(&[b"data: {\"a\":\ndata: [DONE]\ndata: {\"b\":1}\n"]);
        assert_eq!(frames, vec![frame(r#"{"b":1}"#)]);
    }

    #[test]
    fn test_non_json_lines_are_skipped() {
        let frames = reassemble(&[b"event: message\nid: 7\nretry: 100\ndata: hello\ndata: {\"a\":1}\n"]);
        assert_eq!(frames, vec![frame(r#"{"a":1}"#)]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let frames = reassemble(&[b"data: {\"a\":\"x\xffy\"}\n"]);
        assert_eq!(frames, vec![frame("{\"a\":\"x\u{FFFD}y\"}")]);
    }

    #[test]
    fn test_no_duplicates_for_repeated_identical_frames() {
        let frames = reassemble(&[b"data: {\"a\":1}\n\ndata: {\"a\":1}\n\n"]);
        assert_eq!(frames, vec![frame(r#"{"a":1}"#), frame(r#"{"a":1}"#)]);
    }

    #[tokio::test]
    async fn test_stream_yields_frames_in_order() {
        let chunks: Vec<Result<Bytes, String>> = PAYLOAD
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let frames: Vec<_> = SSEParser::new(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_stream_error_terminates_after_delivered_frames() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\ndata: {\"b\"")),
            Err("connection reset".to_string()),
            Ok(Bytes::from_static(b":2}\n")),
        ];

        let mut parser = SSEParser::new(stream::iter(chunks));

        let first = parser.next().await.unwrap().unwrap();
        assert_eq!(first.into_value(), frame(r#"{"a":1}"#));

        match parser.next().await {
            Some(Err(CompletionError::StreamError(message))) => {
                assert_eq!(message, "connection reset")
            }
            other => panic!("expected stream error, got {other:?}"),
        }
        assert!(parser.next().await.is_none());
    }
}
