//! Chunked SSE emitter.
//!
//! Turns a text payload into a lazy, paced [`Stream`] of [`SseEvent`]s:
//! content chunks in source order, then exactly one [`SseEvent::Done`].
//! The first event is ready immediately; every content chunk arms a timer
//! that must elapse before the next event (the sentinel included).
//!
//! Dropping the stream, or calling [`ChunkedEmitter::cancel`], ends the
//! session and releases the pending timer. No chunk is produced afterwards.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::stream::{FusedStream, Stream};
use tokio::time::Sleep;

use crate::chunker::{ChunkCursor, ChunkMode};
use crate::metrics::{self, Timer};
use crate::sse::SseEvent;

/// Lifecycle of one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Created, not yet polled.
    Idle,
    /// Holding a cursor over the remaining chunks.
    Emitting,
    /// Sentinel produced; the stream is exhausted.
    Completed,
    /// Consumer went away before the sentinel.
    Cancelled,
}

impl EmitterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EmitterState::Completed | EmitterState::Cancelled)
    }
}

/// Paced stream of SSE events for a single session.
#[derive(Debug)]
pub struct ChunkedEmitter {
    cursor: ChunkCursor,
    delay: Duration,
    pending: Option<Pin<Box<Sleep>>>,
    state: EmitterState,
    session_id: u64,
    chunks_sent: usize,
    started: Option<Timer>,
}

impl ChunkedEmitter {
    /// Create an emitter using the mode's default pacing.
    pub fn new(text: impl Into<String>, mode: ChunkMode) -> Self {
        Self::with_delay(text, mode, mode.default_delay())
    }

    /// Create an emitter with explicit pacing. A zero delay disables the timer.
    pub fn with_delay(text: impl Into<String>, mode: ChunkMode, delay: Duration) -> Self {
        Self {
            cursor: ChunkCursor::new(text, mode),
            delay,
            pending: None,
            state: EmitterState::Idle,
            session_id: 0,
            chunks_sent: 0,
            started: None,
        }
    }

    /// Tag log events from this session.
    pub fn session_id(mut self, id: u64) -> Self {
        self.session_id = id;
        self
    }

    pub fn state(&self) -> EmitterState {
        self.state
    }

    /// Stop the session early. Idempotent; a no-op once completed.
    pub fn cancel(&mut self) {
        let was = self.state;
        if was.is_terminal() {
            return;
        }

        self.state = EmitterState::Cancelled;
        self.pending = None;

        if was == EmitterState::Emitting {
            let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
            metrics::record_session_cancelled(elapsed);
            tracing::debug!(
                session = self.session_id,
                chunks_sent = self.chunks_sent,
                elapsed_ms = elapsed.as_millis() as u64,
                "Stream cancelled by consumer"
            );
        }
    }

    fn start(&mut self) {
        self.state = EmitterState::Emitting;
        self.started = Some(Timer::new());
        metrics::record_session_started(self.cursor.mode().as_str());
        tracing::debug!(
            session = self.session_id,
            mode = %self.cursor.mode(),
            delay_ms = self.delay.as_millis() as u64,
            "Stream started"
        );
    }

    fn complete(&mut self) {
        self.state = EmitterState::Completed;
        self.pending = None;

        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        metrics::record_session_completed(elapsed);
        tracing::debug!(
            session = self.session_id,
            chunks_sent = self.chunks_sent,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream completed"
        );
    }
}

impl Stream for ChunkedEmitter {
    type Item = SseEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SseEvent>> {
        let this = self.get_mut();

        match this.state {
            EmitterState::Completed | EmitterState::Cancelled => return Poll::Ready(None),
            EmitterState::Idle => this.start(),
            EmitterState::Emitting => {}
        }

        if let Some(sleep) = this.pending.as_mut() {
            ready!(sleep.as_mut().poll(cx));
            this.pending = None;
        }

        match this.cursor.next() {
            Some(chunk) => {
                this.chunks_sent += 1;
                metrics::record_chunk_sent();
                if !this.delay.is_zero() {
                    this.pending = Some(Box::pin(tokio::time::sleep(this.delay)));
                }
                Poll::Ready(Some(SseEvent::Chunk(chunk)))
            }
            None => {
                this.complete();
                Poll::Ready(Some(SseEvent::Done))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.state.is_terminal() {
            (0, Some(0))
        } else {
            // The sentinel is still owed.
            (1, None)
        }
    }
}

impl FusedStream for ChunkedEmitter {
    fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Drop for ChunkedEmitter {
    fn drop(&mut self) {
        self.cancel();
    }
}
