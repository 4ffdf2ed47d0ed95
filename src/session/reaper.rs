// Periodic purge of expired sessions
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::SessionStore;

/// Spawn the reaper loop. Runs independently of request handling; each tick
/// snapshots expired ids under the registry lock and deletes files outside
/// it, so session creation is never blocked for longer than one scan.
pub fn spawn(store: Arc<SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let store = store.clone();
            let reaped = tokio::task::spawn_blocking(move || store.reap_expired())
                .await
                .unwrap_or(0);
            if reaped > 0 {
                info!(reaped, "reaped expired sessions");
            } else {
                debug!("reaper tick, nothing expired");
            }
        }
    })
}
