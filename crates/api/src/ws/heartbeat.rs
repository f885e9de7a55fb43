use std::sync::Weak;

use tokio::task::JoinHandle;

use super::hub::{HeartbeatConfig, ObserverHub};

/// Result of one heartbeat step for one observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatStatus {
    /// Pinged; still within the liveness window.
    Alive,
    /// Silent for longer than the timeout; closed and removed.
    Stale,
    /// Already unregistered or its channel is closed.
    Gone,
}

/// Spawn the heartbeat task for one observer.
///
/// The first ping goes out one interval after registration. The task ends
/// once the observer is gone or the hub itself has been dropped.
pub(crate) fn spawn_heartbeat(
    hub: Weak<ObserverHub>,
    conn_id: String,
    config: HeartbeatConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + config.interval;
        let mut interval = tokio::time::interval_at(start, config.interval);

        loop {
            interval.tick().await;
            let Some(hub) = hub.upgrade() else {
                break;
            };
            match hub.heartbeat_tick(&conn_id).await {
                HeartbeatStatus::Alive => {
                    tracing::trace!(conn_id = %conn_id, "Observer heartbeat ping");
                }
                HeartbeatStatus::Stale => {
                    tracing::info!(conn_id = %conn_id, "Observer heartbeat timed out, closing");
                    break;
                }
                HeartbeatStatus::Gone => break,
            }
        }
    })
}
