// ── Resource cache ──
//
// Keyed, de-duplicating memoization of asynchronous fetches. One cache is
// constructed per application/session and handed to whoever needs it;
// there is no process-wide instance.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cleanup::cleanup_task;
use super::collection::{CollectionStats, EntryCollection, ErasedCollection, Refetch, StateTx};
use super::resource::{Resource, ResourceId};
use crate::async_result::AsyncResult;
use crate::config::CacheConfig;
use crate::error::{CacheError, GetError};
use crate::stream::DataHandle;

/// Point-in-time counters for a whole cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held.
    pub entries: usize,
    /// Entries with a fetch in flight.
    pub pending: usize,
    /// Entries holding `Ok` or `Err`.
    pub settled: usize,
    /// Live subscribers across all entries.
    pub claimed: usize,
    /// Fetches started since the cache was created.
    pub fetches: u64,
}

/// Explicitly constructed resource cache.
///
/// Cheaply cloneable via `Arc<CacheInner>`; clones share all entries.
/// Fetches run as spawned tokio tasks, so every method that may start one
/// (`use_data`, `get` and the `invalidate*` family) must be called from
/// within a tokio runtime.
///
/// With a non-zero release grace the cache sweeps released entries in the
/// background. The sweeper starts with the first `use_data` and stops on
/// [`shutdown`](Self::shutdown) or when the last clone is dropped.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    config: CacheConfig,
    collections: DashMap<ResourceId, Arc<dyn ErasedCollection>>,
    fetches: Arc<AtomicU64>,
    cancel: CancellationToken,
    sweeper_started: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                collections: DashMap::new(),
                fetches: Arc::new(AtomicU64::new(0)),
                cancel: CancellationToken::new(),
                sweeper_started: AtomicBool::new(false),
                sweeper: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // ── Consumption ──────────────────────────────────────────────────

    /// Subscribe to the entry for `params`, fetching only if needed.
    ///
    /// - no entry: one is created in `Pending` and its fetch starts;
    /// - entry in flight: the caller attaches to the same fetch;
    /// - settled entry: returned as-is, `Ok` and `Err` alike;
    /// - invalidated entry: one new fetch starts, the previous value rides
    ///   along in `Pending`.
    ///
    /// The subscription lasts as long as the returned handle.
    pub fn use_data<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: &P,
    ) -> Result<DataHandle<O, E>, CacheError>
    where
        P: Clone + Send + Sync + 'static,
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let key = resource.key_for(params)?;
        let collection = self.collection_for(resource)?;
        self.ensure_sweeper();

        let claim = collection.claim(&key, || {
            self.fetcher(resource, params.clone(), &collection, key.clone())
        });
        if let Some(fetch) = claim.fetch {
            fetch.start();
        }

        Ok(DataHandle::new(collection, key, claim.state))
    }

    /// Subscribe, wait for the entry to settle, and let go again.
    ///
    /// A fetch error comes back as [`GetError::Fetch`].
    pub async fn get<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: &P,
    ) -> Result<O, GetError<E>>
    where
        P: Clone + Send + Sync + 'static,
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let handle = self.use_data(resource, params)?;
        handle.suspend().await.map_err(GetError::Fetch)
    }

    /// Current state for `params` without subscribing or fetching.
    pub fn peek<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: &P,
    ) -> Result<AsyncResult<O, E>, CacheError>
    where
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let key = resource.key_for(params)?;
        Ok(self
            .existing_collection(resource)?
            .map(|collection| collection.peek(&key))
            .unwrap_or_default())
    }

    // ── Invalidation & patching ──────────────────────────────────────

    /// Invalidate the entry for `params`. Returns whether there was an entry.
    ///
    /// A settled entry is re-fetched by the next `use_data`. An entry whose
    /// fetch is still running has that fetch restarted; current waiters
    /// resume on the new result only.
    pub fn invalidate<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: &P,
    ) -> Result<bool, CacheError>
    where
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let key = resource.key_for(params)?;
        Ok(self
            .existing_collection(resource)?
            .is_some_and(|collection| collection.invalidate(&key)))
    }

    /// Invalidate every entry of `resource`. Returns how many.
    pub fn invalidate_resource<P, O, E>(&self, resource: &Resource<P, O, E>) -> usize {
        self.inner
            .collections
            .get(&resource.id())
            .map_or(0, |collection| collection.invalidate_all())
    }

    /// Invalidate every entry in the cache. Returns how many.
    pub fn invalidate_all(&self) -> usize {
        let count = self
            .inner
            .collections
            .iter()
            .map(|collection| collection.invalidate_all())
            .sum();
        debug!(count, "invalidated all cache entries");
        count
    }

    /// Update the `Ok` value for `params` in place and notify subscribers.
    ///
    /// Entries that are not `Ok` are left alone (`Ok(false)`).
    pub fn patch_ok<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: &P,
        update: impl FnOnce(&mut O),
    ) -> Result<bool, CacheError>
    where
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let key = resource.key_for(params)?;
        self.existing_collection(resource)?
            .and_then(|collection| collection.patch_ok(&key, update))
            .ok_or_else(|| CacheError::EntryNotFound {
                resource: resource.name().to_owned(),
                key,
            })
    }

    // ── Eviction ─────────────────────────────────────────────────────

    /// Evict every released entry whose grace period is over.
    pub fn sweep(&self) -> usize {
        let evicted = self.inner.sweep();
        if evicted > 0 {
            debug!(evicted, "swept released cache entries");
        }
        evicted
    }

    /// Stop the background sweeper for good and hand back its task, if one
    /// was started. Released entries are then only evicted by [`sweep`](Self::sweep)
    /// or, with a zero grace, at release.
    pub fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.inner.cancel.cancel();
        debug!("resource cache shut down");
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drop every entry. In-flight fetches still settle for their waiters.
    pub fn clear(&self) {
        self.inner.collections.clear();
        debug!("cleared resource cache");
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.stats().entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let totals = self
            .inner
            .collections
            .iter()
            .map(|collection| collection.stats())
            .fold(CollectionStats::default(), |mut acc, s| {
                acc.entries += s.entries;
                acc.pending += s.pending;
                acc.settled += s.settled;
                acc.claimed += s.claimed;
                acc
            });
        CacheStats {
            entries: totals.entries,
            pending: totals.pending,
            settled: totals.settled,
            claimed: totals.claimed,
            fetches: self.inner.fetches.load(Ordering::Relaxed),
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn collection_for<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
    ) -> Result<Arc<EntryCollection<O, E>>, CacheError>
    where
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let erased = Arc::clone(
            self.inner
                .collections
                .entry(resource.id())
                .or_insert_with(|| {
                    Arc::new(EntryCollection::<O, E>::new(
                        resource.name_arc(),
                        resource.persist(),
                        self.inner.config.release_grace,
                    ))
                })
                .value(),
        );
        downcast(resource, erased)
    }

    fn existing_collection<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
    ) -> Result<Option<Arc<EntryCollection<O, E>>>, CacheError>
    where
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let Some(erased) = self
            .inner
            .collections
            .get(&resource.id())
            .map(|c| Arc::clone(c.value()))
        else {
            return Ok(None);
        };
        downcast(resource, erased).map(Some)
    }

    fn ensure_sweeper(&self) {
        let Some(period) = self.inner.config.sweep_period() else {
            return;
        };
        if self.inner.sweeper_started.swap(true, Ordering::AcqRel) || self.inner.cancel.is_cancelled() {
            return;
        }
        debug!(?period, "starting cache sweeper");
        let task = tokio::spawn(cleanup_task(
            Arc::downgrade(&self.inner),
            period,
            self.inner.cancel.clone(),
        ));
        *self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Build the closure that (re)starts the fetch for one entry.
    ///
    /// Holds the collection weakly: the closure lives in the collection's
    /// own entry.
    fn fetcher<P, O, E>(
        &self,
        resource: &Resource<P, O, E>,
        params: P,
        collection: &Arc<EntryCollection<O, E>>,
        key: String,
    ) -> Refetch<O, E>
    where
        P: Clone + Send + Sync + 'static,
        O: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let fetch = resource.fetch_fn();
        let fetches = Arc::clone(&self.inner.fetches);
        let collection = Arc::downgrade(collection);

        Arc::new(move |state: StateTx<O, E>, epoch: u64| {
            let Some(collection) = collection.upgrade() else {
                return;
            };
            fetches.fetch_add(1, Ordering::Relaxed);
            debug!(resource = %collection.name(), key = %key, epoch, "starting fetch");

            let request = fetch(params.clone());
            let key = key.clone();
            tokio::spawn(async move {
                let result = match request.await {
                    Ok(value) => AsyncResult::Ok(value),
                    Err(err) => {
                        debug!(resource = %collection.name(), key = %key, "fetch failed");
                        AsyncResult::Err(err)
                    }
                };
                collection.settle(&key, &state, epoch, result);
            });
        })
    }
}

impl CacheInner {
    pub(crate) fn sweep(&self) -> usize {
        let now = Instant::now();
        self.collections
            .iter()
            .map(|collection| collection.sweep(now))
            .sum()
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn downcast<P, O, E>(
    resource: &Resource<P, O, E>,
    erased: Arc<dyn ErasedCollection>,
) -> Result<Arc<EntryCollection<O, E>>, CacheError>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    erased
        .as_any()
        .downcast::<EntryCollection<O, E>>()
        .map_err(|_| {
            CacheError::Internal(format!(
                "resource '{}' ({}) is registered with a different value type",
                resource.name(),
                resource.id()
            ))
        })
}
