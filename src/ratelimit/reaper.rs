//! Background removal of idle ledgers.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Spawn a task that periodically drops ledgers with nothing left in the window.
///
/// Without it every identifier ever seen keeps a ledger for the life of the
/// process. Abort the returned handle to stop the task.
pub fn spawn_reaper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    info!(interval = ?every, "Starting idle ledger reaper");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let removed = limiter.purge_idle_now();
            if removed > 0 {
                debug!(
                    removed = removed,
                    remaining = limiter.identifier_count(),
                    "Reaped idle ledgers"
                );
            }
        }
    })
}
