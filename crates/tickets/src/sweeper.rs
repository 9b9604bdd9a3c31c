use std::{sync::Arc, time::Duration};

use {
    chrono::Utc,
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::table::SessionTable;

/// Expire idle sessions every `every` until `cancel` fires.
pub fn spawn_idle_sweeper(
    table: Arc<SessionTable>,
    max_idle: Duration,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can be idle yet.
        ticker.tick().await;
        info!(
            max_idle_secs = max_idle.as_secs(),
            every_secs = every.as_secs(),
            "idle sweeper started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("idle sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = table.expire_idle(max_idle, Utc::now());
                    if expired > 0 {
                        info!(expired, remaining = table.len(), "expired idle ticket sessions");
                    } else {
                        debug!(remaining = table.len(), "idle sweep found nothing");
                    }
                }
            }
        }
    })
}
