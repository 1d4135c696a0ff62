//! Router assembly and the TCP accept loop.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::error::{Result, ServerError};
use crate::handlers::{self, AppState};
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;

const HTTP2_MAX_CONCURRENT_STREAMS: u32 = 1024;
const HTTP2_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);
const HTTP2_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Build the application router.
pub fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// CORS policy for browser clients on the listed origins.
///
/// Credentials are allowed, so methods and headers mirror the preflight
/// request instead of using wildcards.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim())
                .map_err(|e| ServerError::Config(format!("invalid CORS origin {:?}: {}", origin, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Accept connections until shutdown is signaled.
///
/// Each connection is served with HTTP/1.1 or HTTP/2 (h2c prior knowledge),
/// whichever the client speaks. On shutdown the loop stops accepting and
/// every open connection is asked to finish gracefully; callers wait for
/// the drain with [`ShutdownCoordinator::wait_for_drain`].
pub async fn serve(listener: TcpListener, app: Router, shutdown: ShutdownCoordinator) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.wait_for_shutdown() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                // Brief backoff on error to avoid busy loop
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        metrics::record_connection_accepted();
        let guard = shutdown.register_connection();
        let app = app.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = TowerToHyperService::new(app);

            let mut builder = auto::Builder::new(TokioExecutor::new());
            builder
                .http2()
                .max_concurrent_streams(HTTP2_MAX_CONCURRENT_STREAMS)
                .timer(TokioTimer::new())
                .keep_alive_interval(HTTP2_KEEP_ALIVE_INTERVAL)
                .keep_alive_timeout(HTTP2_KEEP_ALIVE_TIMEOUT);

            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);

            let mut shutdown_rx = guard.subscribe();
            let mut draining = *shutdown_rx.borrow();
            if draining {
                conn.as_mut().graceful_shutdown();
            }

            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            // Clients hanging up mid-stream land here; not worth more than debug.
                            tracing::debug!(conn = guard.id(), %peer, error = %e, "Connection closed with error");
                        }
                        break;
                    }
                    _ = shutdown_rx.changed(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            }
        });
    }

    tracing::info!("Accept loop terminated");
}

/// Build the router from CLI configuration.
pub fn app_from_config(config: &crate::config::Config) -> Result<Router> {
    let state = Arc::new(AppState::new(
        config.mode,
        config.delay_ms.map(Duration::from_millis),
    ));
    let cors = cors_layer(&config.allowed_origins)?;
    Ok(router(state, cors))
}

/// Bind the configured address, serve until `shutdown` fires, then drain.
pub async fn run(config: crate::config::Config, shutdown: ShutdownCoordinator) -> Result<()> {
    let app = app_from_config(&config)?;
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!(
        addr = %listener.local_addr()?,
        mode = %config.mode,
        delay_ms = config.stream_delay().as_millis() as u64,
        origins = ?config.allowed_origins,
        "Chat stream server listening"
    );

    serve(listener, app, shutdown.clone()).await;

    tracing::info!(
        active = shutdown.active_connections(),
        timeout_secs = config.shutdown_timeout_secs,
        "Waiting for connections to drain"
    );
    match tokio::time::timeout(config.shutdown_timeout(), shutdown.wait_for_drain()).await {
        Ok(()) => tracing::info!("All connections drained"),
        Err(_) => tracing::warn!(
            active = shutdown.active_connections(),
            "Shutdown timeout reached, dropping remaining streams"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            " http://127.0.0.1:3000 ".to_string(),
        ];
        assert!(cors_layer(&origins).is_ok());
    }

    #[test]
    fn test_cors_layer_rejects_invalid_origin() {
        let origins = vec!["http://bad\norigin".to_string()];
        let err = cors_layer(&origins).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
