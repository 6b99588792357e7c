//! HTTP API Server
//!
//! Axum-based HTTP server for the control API.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ApiConfig;

use super::handlers::AppState;
use super::routes::create_router;

/// HTTP API server
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Run the HTTP server until `shutdown` is cancelled
    ///
    /// A running scrape job is stopped and awaited before returning, so its
    /// checkpoint is written as paused.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .context("Invalid API listen address")?;

        let app = create_router(self.state.clone());

        let listener = TcpListener::bind(&addr)
            .await
            .context("Failed to bind API server")?;

        info!("Control API listening on http://{}", addr);

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.cancelled().await;
                info!("API server shutting down");
            })
            .await
            .context("API server error")?;

        if let Some(outcome) = self
            .state
            .controller
            .shutdown()
            .await
            .context("Failed to stop the running job")?
        {
            info!("Scrape job stopped: {:?}", outcome);
        }

        Ok(())
    }
}
