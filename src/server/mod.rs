//! Server shell - listener, shared state, graceful shutdown
//!
//! One server owns the swappable tool set handle, the MCP session store,
//! and the in-flight request tracker. Shutdown drains in-flight requests
//! through the semaphore before sources are released, so every exit path
//! closes every pool.

pub mod mcp;
pub mod pipeline;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{ToolSet, ToolSetHandle};
use crate::server::mcp::SessionStore;
use crate::{Result, ServerError};

/// Upper bound on concurrently tracked requests; shutdown re-acquires the
/// full amount to wait for the drain
const INFLIGHT_PERMITS: u32 = 10_000;

/// Operator-facing server settings (CLI-sourced, not part of the tools
/// document)
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind address
    pub address: String,
    /// Bind port
    pub port: u16,
    /// Deadline applied to each dispatch
    pub request_timeout: Duration,
    /// Idle timeout after which MCP sessions are forgotten
    pub session_idle_timeout: Duration,
    /// How long shutdown waits for in-flight requests
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
            request_timeout: Duration::from_secs(30),
            session_idle_timeout: Duration::from_secs(30 * 60),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Swappable current tool set generation
    pub toolsets: Arc<ToolSetHandle>,
    /// MCP sessions
    pub sessions: SessionStore,
    /// In-flight request tracker for graceful drain
    pub inflight: Arc<tokio::sync::Semaphore>,
    /// Per-dispatch deadline
    pub request_timeout: Duration,
}

/// The tool server
pub struct Server {
    settings: ServerSettings,
    toolsets: Arc<ToolSetHandle>,
}

impl Server {
    /// Wrap an initial tool set generation
    #[must_use]
    pub fn new(settings: ServerSettings, toolset: ToolSet) -> Self {
        Self {
            settings,
            toolsets: Arc::new(ToolSetHandle::new(toolset)),
        }
    }

    /// Handle for installing a re-resolved tool set
    #[must_use]
    pub fn toolsets(&self) -> Arc<ToolSetHandle> {
        Arc::clone(&self.toolsets)
    }

    /// Run until a shutdown signal, then drain and release
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.settings
                .address
                .parse()
                .map_err(|e| ServerError::Config(format!("invalid bind address: {e}")))?,
            self.settings.port,
        );

        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let inflight = Arc::new(tokio::sync::Semaphore::new(INFLIGHT_PERMITS as usize));

        let state = Arc::new(AppState {
            toolsets: Arc::clone(&self.toolsets),
            sessions: SessionStore::new(self.settings.session_idle_timeout),
            inflight: Arc::clone(&inflight),
            request_timeout: self.settings.request_timeout,
        });

        // periodic session sweep
        let sweep_state = Arc::clone(&state);
        let mut sweep_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = sweep_state.sessions.sweep();
                        if removed > 0 {
                            info!(removed, remaining = sweep_state.sessions.len(), "expired idle MCP sessions");
                        }
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let app = routes::create_router(Arc::clone(&state));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Config(format!("unable to bind {addr}: {e}")))?;

        {
            let toolset = self.toolsets.load();
            info!(
                address = %addr,
                tools = toolset.tools().len(),
                sources = toolset.sources().len(),
                auth_services = toolset.auth_services().len(),
                "server listening"
            );
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown_tx))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        // drain: every in-flight request holds one permit
        info!(timeout = ?self.settings.shutdown_timeout, "draining in-flight requests");
        let drained = tokio::time::timeout(
            self.settings.shutdown_timeout,
            inflight.acquire_many(INFLIGHT_PERMITS),
        )
        .await;
        match drained {
            Ok(Ok(_permits)) => info!("all in-flight requests completed"),
            Ok(Err(_)) => warn!("in-flight semaphore closed unexpectedly during drain"),
            Err(_) => {
                let remaining =
                    (INFLIGHT_PERMITS as usize).saturating_sub(inflight.available_permits());
                warn!(remaining, "drain timeout reached, proceeding with shutdown");
            }
        }

        info!("releasing sources");
        self.toolsets.load().close().await;
        Ok(())
    }
}

/// Resolve on Ctrl+C or SIGTERM, then broadcast shutdown to helper tasks
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
    let _ = shutdown_tx.send(());
}
