//! Prometheus metrics for streaming sessions.
//!
//! All recording goes through the `metrics` facade. Until
//! [`start_metrics_server`] installs the exporter every call is a no-op,
//! which keeps unit tests free of global setup.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use crate::error::{Result, ServerError};

/// Initialize metrics descriptions.
pub fn init_metrics() {
    describe_counter!(
        "chat_stream_connections_total",
        "Total number of TCP connections accepted"
    );
    describe_counter!(
        "chat_stream_sessions_total",
        "Streaming sessions started, by chunk mode"
    );
    describe_counter!(
        "chat_stream_sessions_completed_total",
        "Sessions that emitted the [DONE] sentinel"
    );
    describe_counter!(
        "chat_stream_sessions_cancelled_total",
        "Sessions dropped before completion (client went away)"
    );
    describe_counter!("chat_stream_chunks_sent_total", "Content chunks emitted");
    describe_gauge!(
        "chat_stream_active_sessions",
        "Number of sessions currently emitting"
    );
    describe_histogram!(
        "chat_stream_session_duration_seconds",
        "Wall time from first poll to completion or cancellation"
    );
}

/// Start the Prometheus metrics HTTP listener.
pub fn start_metrics_server(addr: SocketAddr) -> Result<()> {
    // 10ms to ~163s (exponential buckets base 0.01, factor 2, count 15)
    let duration_buckets: [f64; 15] = [
        0.01, 0.02, 0.04, 0.08, 0.16, 0.32, 0.64, 1.28, 2.56, 5.12, 10.24, 20.48, 40.96, 81.92,
        163.84,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("chat_stream_session_duration_seconds".to_string()),
            &duration_buckets,
        )
        .map_err(|e| ServerError::Metrics(e.to_string()))?
        .with_http_listener(addr)
        .install()
        .map_err(|e| ServerError::Metrics(format!("failed to start metrics server: {}", e)))?;

    tracing::info!(%addr, "Metrics server started");
    Ok(())
}

/// Record connection accepted.
pub fn record_connection_accepted() {
    counter!("chat_stream_connections_total").increment(1);
}

/// Record a session leaving `Idle`.
pub fn record_session_started(mode: &'static str) {
    counter!("chat_stream_sessions_total", "mode" => mode).increment(1);
    gauge!("chat_stream_active_sessions").increment(1.0);
}

/// Record a content chunk handed to the response body.
pub fn record_chunk_sent() {
    counter!("chat_stream_chunks_sent_total").increment(1);
}

/// Record a session that reached the sentinel.
pub fn record_session_completed(duration: Duration) {
    counter!("chat_stream_sessions_completed_total").increment(1);
    gauge!("chat_stream_active_sessions").decrement(1.0);
    histogram!("chat_stream_session_duration_seconds").record(duration.as_secs_f64());
}

/// Record a session cut short by its consumer.
pub fn record_session_cancelled(duration: Duration) {
    counter!("chat_stream_sessions_cancelled_total").increment(1);
    gauge!("chat_stream_active_sessions").decrement(1.0);
    histogram!("chat_stream_session_duration_seconds").record(duration.as_secs_f64());
}

/// Timer for measuring durations.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
