// ── Background eviction ──
//
// Periodically sweeps released entries whose grace period has passed.
// Holds only a weak reference, so a dropped cache ends the task.

use std::sync::Weak;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::resource_cache::CacheInner;

pub(crate) async fn cleanup_task(cache: Weak<CacheInner>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = cache.upgrade() else { break };
                let evicted = inner.sweep();
                if evicted > 0 {
                    debug!(evicted, "swept released cache entries");
                } else {
                    trace!("cache sweep found nothing to evict");
                }
            }
        }
    }
    debug!("cache cleanup task stopped");
}
