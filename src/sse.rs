//! SSE (Server-Sent Events) framing.

use bytes::Bytes;
use serde_json::json;

use crate::chunker::Chunk;

/// Terminal marker carried by the last frame of every completed stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Content type of streamed responses.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Chunk(Chunk),
    Done,
}

impl SseEvent {
    /// Serialize into a complete `data:` frame including the blank line.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            SseEvent::Chunk(chunk) => format_sse_chunk(&chunk.content),
            SseEvent::Done => format_sse_done(),
        }
    }
}

/// Format a content chunk as an SSE event.
pub fn format_sse_chunk(content: &str) -> Bytes {
    let data = json!({ "content": content });
    format!("data: {}\n\n", data).into()
}

/// Format the done marker as an SSE event.
pub fn format_sse_done() -> Bytes {
    format!("data: {}\n\n", DONE_MARKER).into()
}
