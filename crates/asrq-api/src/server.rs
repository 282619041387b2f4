//! API server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use asrq_config::ServerConfig;

use crate::http::routes::create_router;
use crate::state::AppState;
use crate::websocket::spawn_status_broadcaster;

/// HTTP and WebSocket server over a running queue service.
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        self.config.addr()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until `shutdown` is cancelled, then stop the status broadcaster.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        let broadcaster = spawn_status_broadcaster(self.state.clone(), shutdown.child_token());

        info!("API server listening on {}", addr);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await;

        shutdown.cancel();
        if let Err(e) = broadcaster.await {
            error!("Status broadcaster ended abnormally: {}", e);
        }

        served?;
        info!("API server stopped");
        Ok(())
    }
}
