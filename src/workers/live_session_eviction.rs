use std::time::Duration;

use crate::live::LiveSessions;

pub async fn run(live: &LiveSessions, idle_timeout: Duration) {
    let evicted = live.evict_idle(idle_timeout).await;
    if evicted > 0 {
        tracing::info!(evicted, "live_session_eviction: done");
    } else {
        tracing::debug!("live_session_eviction: nothing idle");
    }
}
