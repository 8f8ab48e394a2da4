//! Background expiry sweep for the L1 tier.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::L1Cache;

/// Periodically remove expired entries until shutdown is signalled.
///
/// The task only holds a weak reference, so it also stops once the cache
/// itself is dropped.
pub fn spawn_sweeper(
    cache: &Arc<L1Cache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let cache = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(cache) = cache.upgrade() else { break };
                    let removed = cache.sweep_expired();
                    if removed > 0 {
                        debug!(removed, remaining = cache.len(), "L1 sweep removed expired entries");
                    }
                }
            }
        }
        debug!("L1 sweeper stopped");
    })
}
