//! HTTP handlers for the chat stream and health endpoints.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Version};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::chunker::ChunkMode;
use crate::emitter::ChunkedEmitter;
use crate::sse::EVENT_STREAM_CONTENT_TYPE;

/// Shared application state
pub struct AppState {
    pub mode: ChunkMode,
    /// Explicit pacing; `None` falls back to the mode's default.
    pub delay: Option<Duration>,
    next_session: AtomicU64,
}

impl AppState {
    pub fn new(mode: ChunkMode, delay: Option<Duration>) -> Self {
        Self {
            mode,
            delay,
            next_session: AtomicU64::new(1),
        }
    }

    fn next_session_id(&self) -> u64 {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Per-request overrides taken from the query string.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub mode: Option<ChunkMode>,
    pub delay_ms: Option<u64>,
}

/// POST /api/chat/stream
///
/// Streams `message` back as `data: {"content": ...}` frames followed by
/// `data: [DONE]`. `?mode=` and `?delay_ms=` override the server defaults
/// for this request. A missing or malformed body is rejected by the `Json`
/// extractor before any stream is created.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    version: Version,
    Query(params): Query<StreamParams>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let mode = params.mode.unwrap_or(state.mode);
    // A server-wide delay only applies to the server-wide mode.
    let delay = match (params.delay_ms, params.mode) {
        (Some(ms), _) => Duration::from_millis(ms),
        (None, Some(mode)) if mode != state.mode => mode.default_delay(),
        (None, _) => state.delay.unwrap_or_else(|| mode.default_delay()),
    };
    let session = state.next_session_id();

    tracing::info!(
        session,
        %mode,
        delay_ms = delay.as_millis() as u64,
        message_bytes = request.message.len(),
        "Chat stream requested"
    );

    let events = ChunkedEmitter::with_delay(request.message, mode, delay)
        .session_id(session)
        .map(|event| Ok::<_, Infallible>(event.to_bytes()));

    let mut response = Body::from_stream(events).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    // Connection-specific headers are illegal in HTTP/2.
    if version < Version::HTTP_2 {
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    response
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
