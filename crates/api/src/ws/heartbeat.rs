use std::sync::Arc;
use std::time::Duration;

use crate::ws::registry::SessionRegistry;

/// Spawn a background task that sends periodic Ping frames to all
/// connected sessions.
///
/// The returned `JoinHandle` is aborted during shutdown.
pub fn start_heartbeat(
    sessions: Arc<SessionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let count = sessions.session_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            sessions.ping_all().await;
        }
    })
}
