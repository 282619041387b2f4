//! Periodic queue status pushed to WebSocket subscribers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Publish a snapshot every `status.broadcast_interval_ms` while anyone listens.
pub fn spawn_status_broadcaster(state: Arc<AppState>, token: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_millis(
        state
            .service
            .config()
            .status
            .broadcast_interval_ms
            .max(1),
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if state.status_subscribers() == 0 {
                        continue;
                    }
                    match state.snapshot_json().await {
                        Ok(json) => {
                            state.publish_status(json);
                        }
                        Err(e) => warn!("Failed to build status snapshot: {}", e),
                    }
                }
            }
        }

        debug!("Status broadcaster stopped");
    })
}

/// WebSocket upgrade handler.
///
/// GET /ws/status
pub async fn status_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("Status subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.subscribe_status();

    // First snapshot goes out without waiting for the next tick
    match state.snapshot_json().await {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        Err(e) => warn!("Failed to build status snapshot: {}", e),
    }

    let sender_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Status subscriber lagged, {} snapshots skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Incoming frames are ignored until the client goes away
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    sender_task.abort();
    info!("Status subscriber disconnected");
}
