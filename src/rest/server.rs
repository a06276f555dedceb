//! REST API server lifecycle management.
//!
//! Owns the background tasks that run beside the HTTP listener (the cache
//! sweeper and the startup remote refresh) and stops them when the server
//! shuts down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::rest::{build_router, ApiState};

/// Delay before the first background fetch after startup
pub const INITIAL_REFRESH_DELAY: Duration = Duration::from_secs(5);

/// Background tasks owned by the server. Dropping the set aborts them.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Spawn the cache sweeper and the delayed startup refresh for `state`.
    pub fn spawn(state: &ApiState) -> Self {
        let sweep = Duration::from_secs(state.config.cache.sweep_secs.max(1));
        let sweeper = state.service.cache().spawn_sweeper(sweep);
        let refresh = tokio::spawn(Arc::clone(&state.service).initial_refresh(INITIAL_REFRESH_DELAY));

        Self {
            handles: vec![sweeper, refresh],
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every task.
    pub fn abort(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the HTTP server until Ctrl-C.
pub async fn run(state: ApiState, port: u16) -> Result<()> {
    let mut tasks = BackgroundTasks::spawn(&state);
    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Branch manager API listening on http://{}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tasks.abort();
    tracing::info!("Server stopped");

    served.context("HTTP server failed")
}
