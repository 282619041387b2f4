//! Periodic payload retention cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use asrq_config::RetentionConfig;

use crate::queue::TaskQueue;

/// Runs `cleanup_old_audio_data` on a fixed interval.
pub struct RetentionScheduler;

impl RetentionScheduler {
    /// Spawn the cleanup loop. Returns `None` when retention is disabled.
    ///
    /// The first pass runs one full interval after startup.
    pub fn spawn(
        queue: Arc<TaskQueue>,
        config: &RetentionConfig,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !config.enabled {
            info!("Retention cleanup disabled");
            return None;
        }

        let period = Duration::from_secs(config.interval_seconds.max(1));
        let max_age_minutes = config.max_age_minutes;

        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Retention cleanup every {}s for payloads older than {} minutes",
                period.as_secs(),
                max_age_minutes
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = queue.cleanup_old_audio_data(max_age_minutes).await {
                            error!("Retention cleanup failed: {}", e);
                        }
                    }
                }
            }

            info!("Retention cleanup stopped");
        }))
    }
}
