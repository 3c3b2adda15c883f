// ── Runtime cache configuration ──
//
// Describes *how* a cache evicts released entries. Built by the consumer
// (usually from `catalog-config`) and handed to `ResourceCache::new`;
// core never reads config files.

use std::time::Duration;

/// Grace period between an entry's last release and its eviction.
pub const DEFAULT_RELEASE_GRACE: Duration = Duration::from_secs(5);

/// Configuration for a single [`ResourceCache`](crate::ResourceCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a settled, unclaimed entry is kept before eviction.
    /// Zero evicts as soon as the last subscriber lets go.
    pub release_grace: Duration,
    /// Period of the background sweeper. Zero falls back to
    /// `release_grace`.
    pub cleanup_interval: Duration,
}

impl CacheConfig {
    /// Evict at release time, with no background sweeper.
    pub fn immediate() -> Self {
        Self {
            release_grace: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }
    }

    /// How often the background sweeper runs. `None` when released entries
    /// are evicted at release and no sweeper is needed.
    pub fn sweep_period(&self) -> Option<Duration> {
        if self.release_grace.is_zero() {
            None
        } else if self.cleanup_interval.is_zero() {
            Some(self.release_grace)
        } else {
            Some(self.cleanup_interval)
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            release_grace: DEFAULT_RELEASE_GRACE,
            cleanup_interval: DEFAULT_RELEASE_GRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_period_follows_the_grace() {
        assert_eq!(CacheConfig::immediate().sweep_period(), None);
        assert_eq!(CacheConfig::default().sweep_period(), Some(DEFAULT_RELEASE_GRACE));

        let lazy = CacheConfig {
            release_grace: Duration::from_secs(30),
            cleanup_interval: Duration::ZERO,
        };
        assert_eq!(lazy.sweep_period(), Some(Duration::from_secs(30)));
    }
}
