//! Chat stream demo server.
//!
//! ```bash
//! chat-stream-server --port 8000 --mode paragraph
//! curl -N -X POST localhost:8000/api/chat/stream \
//!     -H 'content-type: application/json' -d '{"message":"hello world"}'
//! ```

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_stream_server::config::{Config, LogFormat};
use chat_stream_server::metrics::{init_metrics, start_metrics_server};
use chat_stream_server::server;
use chat_stream_server::shutdown::{shutdown_signal, ShutdownCoordinator};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    init_logging(&config)?;

    // Build the runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    init_metrics();
    if let Some(addr) = config.metrics_listen {
        start_metrics_server(addr)?;
    }

    let shutdown = ShutdownCoordinator::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.shutdown();
        }
    });

    tracing::info!(workers = config.worker_threads(), "Starting chat stream server");
    server::run(config, shutdown).await?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.log_level()))?;

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .init();
        }
    }

    Ok(())
}
