//! Status API server lifecycle.
//!
//! [`start_server`] binds and serves until the process exits;
//! [`spawn_server`] runs it on a background task next to the tick loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tycoon_core::config::ObserverConfig;

use crate::router::build_router;
use crate::state::AppState;

/// Bind address of the status API.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

impl From<&ObserverConfig> for ServerConfig {
    fn from(config: &ObserverConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

impl ServerConfig {
    fn addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
    }
}

/// Serve the status API until the process is terminated.
///
/// # Errors
///
/// Returns [`ServerError`] if the address is invalid, the listener cannot
/// bind, or serving fails.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr = config.addr()?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "status API listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Run the status API on a background task.
///
/// The address is validated before spawning; bind failures inside the
/// task are logged.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the configured address does not parse.
pub fn spawn_server(
    config: ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, ServerError> {
    config.addr()?;
    let port = config.port;
    let handle = tokio::spawn(async move {
        if let Err(e) = start_server(&config, state).await {
            error!(error = %e, "status API exited with error");
        }
    });
    info!(port, "status API spawned on background task");
    Ok(handle)
}

/// Errors that can occur when starting or running the status API.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server hit a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
