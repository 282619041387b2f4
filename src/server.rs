//! Server startup and shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use asrq_api::{ApiServer, AppState};
use asrq_config::{Config, ConfigValidator};
use asrq_queue::QueueService;

/// Run the queue service and API until Ctrl-C or SIGTERM.
pub(crate) async fn run_server(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !validation.is_valid() {
        for err in &validation.errors {
            error!("Config {}: {}", err.path, err.message);
        }
        return Err("invalid configuration".into());
    }

    info!("Starting asrq v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(QueueService::open(&config).await?);
    service.start().await;
    info!(
        "{} workers on devices {:?}, max queue size {}",
        service.worker_count(),
        config.workers.devices,
        config.queue.max_queue_size
    );

    let state = Arc::new(AppState::new(service.clone()));
    let server = ApiServer::new(config.server.clone(), state);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    info!("API Endpoints:");
    info!("  POST /api/asr/async         - submit audio");
    info!("  POST /api/asr/sync          - submit audio and wait");
    info!("  GET  /api/asr/status/{{id}}   - task status");
    info!("  GET  /ws/status             - queue status stream");

    let served = server.run(token).await;

    service.shutdown().await;
    info!("Shut down cleanly");
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
