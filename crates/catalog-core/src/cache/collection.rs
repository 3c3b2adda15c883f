// ── Per-resource entry collection ──
//
// Concurrent storage for every entry of one resource. All bookkeeping
// (claims, staleness, epochs) is mutated under the owning `DashMap` shard
// lock, so find-or-create and claim happen as one step and eviction can
// never race a concurrent claim. Fetches are started only after the lock
// is released.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::async_result::AsyncResult;

pub(crate) type StateTx<O, E> = Arc<watch::Sender<AsyncResult<O, E>>>;

/// Starts a fetch for an entry's params, settling `state` at the given epoch.
pub(crate) type Refetch<O, E> = Arc<dyn Fn(StateTx<O, E>, u64) + Send + Sync>;

/// One memoized resource + params combination.
struct Slot<O, E> {
    /// Current state, pushed to every subscriber on change.
    state: StateTx<O, E>,
    /// Number of live subscribers.
    claimed: usize,
    /// When `claimed` last dropped to zero.
    released_at: Option<Instant>,
    /// Generation of the most recently started fetch.
    epoch: u64,
    /// Set by invalidation; the next claim re-fetches.
    stale: bool,
    /// Re-runs the fetch with the params that created the entry.
    refetch: Refetch<O, E>,
}

/// A fetch that has been scheduled under the map lock and must be started
/// once the lock is gone.
pub(crate) struct PendingFetch<O, E> {
    refetch: Refetch<O, E>,
    state: StateTx<O, E>,
    epoch: u64,
}

impl<O, E> PendingFetch<O, E> {
    pub(crate) fn start(self) {
        (self.refetch)(self.state, self.epoch);
    }
}

/// Result of claiming an entry.
pub(crate) struct Claim<O, E> {
    pub state: StateTx<O, E>,
    /// The fetch the caller must start, if any.
    pub fetch: Option<PendingFetch<O, E>>,
}

#[cfg(test)]
impl<O, E> Claim<O, E> {
    /// Epoch of the fetch this claim has to start.
    pub(crate) fn epoch(&self) -> Option<u64> {
        self.fetch.as_ref().map(|fetch| fetch.epoch)
    }
}

/// Per-collection counters, summed into `CacheStats`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CollectionStats {
    pub entries: usize,
    pub pending: usize,
    pub settled: usize,
    pub claimed: usize,
}

/// Type-erased view of an `EntryCollection<O, E>`, so one cache can hold
/// collections of unrelated value types.
pub(crate) trait ErasedCollection: Send + Sync {
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn sweep(&self, now: Instant) -> usize;
    fn invalidate_all(&self) -> usize;
    fn stats(&self) -> CollectionStats;
}

pub(crate) struct EntryCollection<O, E> {
    /// Resource name, for diagnostics.
    name: Arc<str>,
    persist: bool,
    grace: Duration,
    /// Canonical params key -> slot.
    entries: DashMap<String, Slot<O, E>>,
}

impl<O, E> EntryCollection<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: Arc<str>, persist: bool, grace: Duration) -> Self {
        Self {
            name,
            persist,
            grace,
            entries: DashMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Find or create the entry for `key` and add a subscriber to it.
    ///
    /// A new entry starts out `Pending`; so does a stale one, carrying its
    /// previous value. In both cases the returned claim carries the single
    /// fetch the caller has to start. `refetch` is only called for a new
    /// entry, and is kept for later invalidations.
    pub(crate) fn claim(&self, key: &str, refetch: impl FnOnce() -> Refetch<O, E>) -> Claim<O, E> {
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.claimed += 1;
                slot.released_at = None;

                let fetch = if slot.stale {
                    slot.stale = false;
                    slot.epoch += 1;
                    slot.state.send_modify(|state| {
                        *state = AsyncResult::Pending(std::mem::take(state).into_previous());
                    });
                    debug!(resource = %self.name, key, epoch = slot.epoch, "re-fetching invalidated entry");
                    Some(slot.pending_fetch())
                } else {
                    debug!(resource = %self.name, key, claimed = slot.claimed, "attached to cache entry");
                    None
                };

                Claim {
                    state: Arc::clone(&slot.state),
                    fetch,
                }
            }
            Entry::Vacant(vacant) => {
                let (tx, _) = watch::channel(AsyncResult::Pending(None));
                let slot = vacant.insert(Slot {
                    state: Arc::new(tx),
                    claimed: 1,
                    released_at: None,
                    epoch: 1,
                    stale: false,
                    refetch: refetch(),
                });
                debug!(resource = %self.name, key, "created cache entry");
                Claim {
                    state: Arc::clone(&slot.state),
                    fetch: Some(slot.pending_fetch()),
                }
            }
        }
    }

    /// Drop one subscriber. Evicts right away when the grace period is zero
    /// and nothing else keeps the entry alive.
    pub(crate) fn release(&self, key: &str, state: &StateTx<O, E>) {
        let now = Instant::now();
        let evict_now = match self.entries.get_mut(key) {
            Some(mut slot) if Arc::ptr_eq(&slot.state, state) => {
                slot.claimed = slot.claimed.saturating_sub(1);
                if slot.claimed == 0 {
                    slot.released_at = Some(now);
                }
                self.grace.is_zero() && self.is_evictable(&slot, now)
            }
            _ => false,
        };
        if evict_now {
            self.evict(key, now);
        }
    }

    /// Settle the fetch started at `epoch`.
    ///
    /// Results of superseded fetches are dropped. If the entry is already
    /// gone (cleared while in flight) the outcome still reaches whoever is
    /// waiting on it.
    pub(crate) fn settle(
        &self,
        key: &str,
        state: &StateTx<O, E>,
        epoch: u64,
        result: AsyncResult<O, E>,
    ) {
        let now = Instant::now();
        let evict_now = match self.entries.get_mut(key) {
            Some(slot) if Arc::ptr_eq(&slot.state, state) => {
                if slot.epoch != epoch {
                    debug!(
                        resource = %self.name,
                        key,
                        epoch,
                        current = slot.epoch,
                        "discarding superseded fetch result"
                    );
                    return;
                }
                slot.state.send_replace(result);
                debug!(resource = %self.name, key, epoch, "cache entry settled");
                self.grace.is_zero() && self.is_evictable(&slot, now)
            }
            _ => {
                state.send_if_modified(|current| {
                    if current.is_pending() {
                        *current = result;
                        true
                    } else {
                        false
                    }
                });
                false
            }
        };
        if evict_now {
            self.evict(key, now);
        }
    }

    /// Invalidate one entry. Returns whether it existed.
    ///
    /// A settled entry is marked stale and re-fetched by its next claim. An
    /// entry still in flight gets a new epoch and its fetch is restarted
    /// right away, so the superseded result never reaches a subscriber.
    pub(crate) fn invalidate(&self, key: &str) -> bool {
        let restart = match self.entries.get_mut(key) {
            Some(mut slot) => self.mark_stale(key, &mut slot),
            None => return false,
        };
        if let Some(fetch) = restart {
            fetch.start();
        }
        true
    }

    /// Current state of `key`, `Init` if there is no entry.
    pub(crate) fn peek(&self, key: &str) -> AsyncResult<O, E> {
        self.entries
            .get(key)
            .map(|slot| slot.state.borrow().clone())
            .unwrap_or_default()
    }

    /// Apply `update` to an `Ok` value in place. `None` if there is no entry,
    /// otherwise whether the entry was `Ok` and got patched.
    pub(crate) fn patch_ok(&self, key: &str, update: impl FnOnce(&mut O)) -> Option<bool> {
        let slot = self.entries.get(key)?;
        let patched = slot.state.send_if_modified(|state| match state {
            AsyncResult::Ok(value) => {
                update(value);
                true
            }
            _ => false,
        });
        Some(patched)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn mark_stale(&self, key: &str, slot: &mut Slot<O, E>) -> Option<PendingFetch<O, E>> {
        if slot.state.borrow().is_pending() {
            slot.epoch += 1;
            debug!(resource = %self.name, key, epoch = slot.epoch, "restarting in-flight fetch of invalidated entry");
            Some(slot.pending_fetch())
        } else {
            slot.stale = true;
            debug!(resource = %self.name, key, "invalidated cache entry");
            None
        }
    }

    fn is_evictable(&self, slot: &Slot<O, E>, now: Instant) -> bool {
        !self.persist
            && slot.claimed == 0
            && slot
                .released_at
                .is_some_and(|released| now.duration_since(released) >= self.grace)
            && slot.state.borrow().is_settled()
    }

    fn evict(&self, key: &str, now: Instant) -> bool {
        let removed = self
            .entries
            .remove_if(key, |_, slot| self.is_evictable(slot, now))
            .is_some();
        if removed {
            debug!(resource = %self.name, key, "evicted released cache entry");
        }
        removed
    }
}

impl<O, E> Slot<O, E> {
    fn pending_fetch(&self) -> PendingFetch<O, E> {
        PendingFetch {
            refetch: Arc::clone(&self.refetch),
            state: Arc::clone(&self.state),
            epoch: self.epoch,
        }
    }
}

impl<O, E> ErasedCollection for EntryCollection<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !self.is_evictable(slot, now));
        before.saturating_sub(self.entries.len())
    }

    fn invalidate_all(&self) -> usize {
        let mut count = 0;
        let mut restarts = Vec::new();
        for mut slot in self.entries.iter_mut() {
            let (key, slot) = slot.pair_mut();
            restarts.extend(self.mark_stale(key, slot));
            count += 1;
        }
        for fetch in restarts {
            fetch.start();
        }
        count
    }

    fn stats(&self) -> CollectionStats {
        self.entries
            .iter()
            .fold(CollectionStats::default(), |mut stats, slot| {
                let state = slot.state.borrow();
                stats.entries += 1;
                stats.claimed += slot.claimed;
                if state.is_pending() {
                    stats.pending += 1;
                } else if state.is_settled() {
                    stats.settled += 1;
                }
                stats
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collection(persist: bool, grace: Duration) -> EntryCollection<u32, String> {
        EntryCollection::new("test".into(), persist, grace)
    }

    fn claim(col: &EntryCollection<u32, String>, key: &str) -> Claim<u32, String> {
        col.claim(key, || Arc::new(|_: StateTx<u32, String>, _: u64| {}))
    }

    #[test]
    fn first_claim_creates_pending_entry() {
        let col = collection(false, Duration::ZERO);
        let claim = claim(&col, "k");
        assert_eq!(claim.epoch(), Some(1));
        assert!(claim.state.borrow().is_pending());
        assert_eq!(col.len(), 1);
    }

    #[test]
    fn second_claim_attaches_without_fetch() {
        let col = collection(false, Duration::ZERO);
        let first = claim(&col, "k");
        let second = claim(&col, "k");
        assert_eq!(second.epoch(), None);
        assert!(Arc::ptr_eq(&first.state, &second.state));
        assert_eq!(col.stats().claimed, 2);
    }

    #[test]
    fn superseded_settle_is_discarded() {
        let col = collection(false, Duration::ZERO);
        let claim = claim(&col, "k");
        col.settle("k", &claim.state, 1, AsyncResult::Ok(1));
        col.invalidate("k");

        let refetch = self::claim(&col, "k");
        assert_eq!(refetch.epoch(), Some(2));
        assert_eq!(*refetch.state.borrow(), AsyncResult::Pending(Some(1)));

        col.settle("k", &claim.state, 1, AsyncResult::Ok(99));
        assert_eq!(*refetch.state.borrow(), AsyncResult::Pending(Some(1)));

        col.settle("k", &claim.state, 2, AsyncResult::Ok(2));
        assert_eq!(col.peek("k"), AsyncResult::Ok(2));
    }

    #[test]
    fn invalidating_in_flight_entry_restarts_its_fetch() {
        let col = collection(false, Duration::ZERO);
        let started = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&started);
        let first = col.claim("k", move || {
            Arc::new(move |_: StateTx<u32, String>, epoch: u64| log.lock().unwrap().push(epoch))
        });
        first.fetch.unwrap().start();

        assert!(col.invalidate("k"));
        assert_eq!(*started.lock().unwrap(), vec![1, 2]);

        col.settle("k", &first.state, 1, AsyncResult::Ok(1));
        assert_eq!(col.peek("k"), AsyncResult::Pending(None));

        col.settle("k", &first.state, 2, AsyncResult::Ok(2));
        assert_eq!(col.peek("k"), AsyncResult::Ok(2));
        // Settled again: the next invalidation waits for a claim.
        assert_eq!(col.invalidate_all(), 1);
        assert_eq!(*started.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn zero_grace_evicts_on_last_release_once_settled() {
        let col = collection(false, Duration::ZERO);
        let a = claim(&col, "k");
        let b = claim(&col, "k");
        col.release("k", &a.state);
        col.release("k", &b.state);
        // Still in flight: kept until it settles.
        assert_eq!(col.len(), 1);

        col.settle("k", &a.state, 1, AsyncResult::Err("nope".into()));
        assert_eq!(col.len(), 0);
        assert_eq!(col.peek("k"), AsyncResult::Init);
    }

    #[test]
    fn persistent_entries_survive_release() {
        let col = collection(true, Duration::ZERO);
        let claim = claim(&col, "k");
        col.settle("k", &claim.state, 1, AsyncResult::Ok(5));
        col.release("k", &claim.state);
        assert_eq!(col.len(), 1);
        assert_eq!(col.sweep(Instant::now() + Duration::from_secs(3600)), 0);
    }

    #[test]
    fn sweep_honours_grace_period() {
        let col = collection(false, Duration::from_secs(5));
        let claim = claim(&col, "k");
        col.settle("k", &claim.state, 1, AsyncResult::Ok(5));
        col.release("k", &claim.state);

        let now = Instant::now();
        assert_eq!(col.sweep(now), 0);
        assert_eq!(col.sweep(now + Duration::from_secs(5)), 1);
        assert_eq!(col.len(), 0);
    }

    #[test]
    fn patch_ok_only_touches_ok() {
        let col = collection(false, Duration::ZERO);
        assert_eq!(col.patch_ok("k", |v| *v += 1), None);

        let claim = claim(&col, "k");
        assert_eq!(col.patch_ok("k", |v| *v += 1), Some(false));

        col.settle("k", &claim.state, 1, AsyncResult::Ok(1));
        assert_eq!(col.patch_ok("k", |v| *v += 1), Some(true));
        assert_eq!(col.peek("k"), AsyncResult::Ok(2));
    }
}
