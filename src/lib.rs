//! Demo chat backend that streams the request text back as paced
//! Server-Sent Events.
//!
//! The interesting part is [`emitter::ChunkedEmitter`]: a lazy stream that
//! splits a payload by word or paragraph, waits a fixed delay between
//! chunks and finishes with a `[DONE]` frame. Everything else is HTTP
//! plumbing around it.

pub mod chunker;
pub mod config;
pub mod emitter;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod sse;

pub use chunker::{Chunk, ChunkCursor, ChunkMode};
pub use config::Config;
pub use emitter::{ChunkedEmitter, EmitterState};
pub use error::{Result, ServerError};
pub use sse::SseEvent;
