//! Server configuration.
//!
//! Settings come from command-line flags, each with an environment variable
//! fallback, so the server runs unchanged under a process manager.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::chunker::ChunkMode;
use crate::error::{Result, ServerError};

/// Demo chat server that streams the request text back as paced SSE
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-stream-server")]
#[command(version, about = "Streams chat messages back as paced Server-Sent Events")]
pub struct Config {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Chunk granularity
    #[arg(short, long, env = "STREAM_MODE", value_enum, default_value_t = ChunkMode::Word)]
    pub mode: ChunkMode,

    /// Delay between chunks in milliseconds (default: 10 for word, 100 for paragraph)
    #[arg(short = 'd', long, env = "STREAM_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Allowed CORS origin (repeatable or comma separated)
    #[arg(
        long = "allowed-origin",
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = [
            "http://localhost:3000".to_string(),
            "http://127.0.0.1:3000".to_string(),
        ]
    )]
    pub allowed_origins: Vec<String>,

    /// Number of Tokio worker threads (0 = num_cpus)
    #[arg(short = 'w', long, default_value_t = 0)]
    pub workers: usize,

    /// Seconds to wait for in-flight streams on shutdown
    #[arg(long, default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    /// Prometheus listen address (disabled when unset)
    #[arg(long, env = "METRICS_LISTEN")]
    pub metrics_listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Minimal logging output
    #[arg(long, conflicts_with = "debug")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Resolve `host:port` to the address the listener binds.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let target = (self.host.as_str(), self.port);
        target
            .to_socket_addrs()
            .map_err(|e| {
                ServerError::Config(format!("invalid listen address {}:{}: {}", self.host, self.port, e))
            })?
            .next()
            .ok_or_else(|| {
                ServerError::Config(format!("{}:{} resolved to no address", self.host, self.port))
            })
    }

    /// Pacing for sessions that do not override it.
    pub fn stream_delay(&self) -> Duration {
        self.delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.mode.default_delay())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.debug {
            "debug"
        } else {
            "info"
        }
    }

    pub fn worker_threads(&self) -> usize {
        if self.workers == 0 {
            num_cpus()
        } else {
            self.workers
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
