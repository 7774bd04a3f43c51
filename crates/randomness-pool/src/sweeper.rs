//! Background cooldown sweep
//!
//! Accounts leave Cooldown only through this sweep. Allocation never releases
//! an expired cooldown on its own, so an account returned with a five minute
//! cooldown becomes allocatable somewhere between five minutes and five minutes
//! plus one sweep interval later.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::pool::PoolManager;

/// Spawn a task that calls `reconcile_cooldowns` every `interval`.
///
/// The first sweep runs one interval after spawning. The task runs until the
/// returned handle is aborted or the runtime shuts down.
pub fn spawn_cooldown_sweeper(
    pool: Arc<PoolManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "cooldown sweeper started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; nothing has been returned yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let released = pool.reconcile_cooldowns().await;
            if released > 0 {
                info!(released, "released accounts from cooldown");
            } else {
                debug!("cooldown sweep found nothing to release");
            }
        }
    })
}
