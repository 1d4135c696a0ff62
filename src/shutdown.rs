//! Graceful shutdown coordination.
//!
//! Uses a watch channel to broadcast the shutdown signal and counts live
//! connections so the server can wait for in-flight streams to drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// Shutdown coordinator for graceful termination.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<ShutdownInner>,
}

struct ShutdownInner {
    /// Broadcast channel for shutdown signal.
    shutdown_tx: watch::Sender<bool>,
    /// Receiver template handed out by `subscribe`.
    shutdown_rx: watch::Receiver<bool>,
    /// Active connection count.
    active_connections: AtomicU64,
    /// Woken when the connection count reaches zero.
    drain_notify: Notify,
    /// Next connection id for log correlation.
    next_conn_id: AtomicU64,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            inner: Arc::new(ShutdownInner {
                shutdown_tx,
                shutdown_rx,
                active_connections: AtomicU64::new(0),
                drain_notify: Notify::new(),
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Signal shutdown to the accept loop and all connections.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
    }

    /// Get a receiver to watch for shutdown.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_rx.clone()
    }

    /// Resolves once shutdown has been signaled.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `inner`, so `wait_for` cannot see a closed channel here.
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> u64 {
        self.inner.active_connections.load(Ordering::Relaxed)
    }

    /// Register a new connection and return a guard that decrements on drop.
    pub fn register_connection(&self) -> ConnectionGuard {
        let id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        self.inner.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            coordinator: self.clone(),
            id,
        }
    }

    /// Wait for all connections to drain.
    pub async fn wait_for_drain(&self) {
        loop {
            // Create the notification future before checking the count to avoid
            // missing a notify that happens after the load but before awaiting.
            let notified = self.inner.drain_notify.notified();
            if self.active_connections() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Unregister a connection, waking drain waiters on the last one.
    fn unregister_connection(&self, id: u64) {
        let result = self.inner.active_connections.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |curr| curr.checked_sub(1),
        );

        match result {
            Ok(1) => self.inner.drain_notify.notify_waiters(),
            Ok(_) => {}
            Err(_) => {
                tracing::error!(conn = id, "Connection released with active count already at 0");
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for connection lifecycle tracking.
pub struct ConnectionGuard {
    /// Coordinator to notify on drop.
    coordinator: ShutdownCoordinator,
    /// Connection id, unique per coordinator.
    id: u64,
}

impl ConnectionGuard {
    /// Get the connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a receiver to watch for shutdown.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.coordinator.subscribe()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.coordinator.unregister_connection(self.id);
    }
}

/// Resolve on SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register SIGTERM, using ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, initiating shutdown"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}

/// Resolve on ctrl-c.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received ctrl-c, initiating shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connection_tracking() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.active_connections(), 0);

        let guard1 = coordinator.register_connection();
        let guard2 = coordinator.register_connection();
        assert_eq!(coordinator.active_connections(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(coordinator.active_connections(), 1);

        drop(guard2);
        assert_eq!(coordinator.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let coordinator = ShutdownCoordinator::new();
        let rx = coordinator.subscribe();
        assert!(!*rx.borrow());

        let waiter = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.wait_for_shutdown().await }
        });

        coordinator.shutdown();
        assert!(*rx.borrow());
        assert!(*coordinator.register_connection().subscribe().borrow());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should observe shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_drain() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.wait_for_drain().await;

        let guard = coordinator.register_connection();
        let drain = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.wait_for_drain().await }
        });

        tokio::task::yield_now().await;
        assert!(!drain.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), drain)
            .await
            .expect("drain should finish once the last guard drops")
            .unwrap();
    }
}
