// ── Cache subscriptions ──
//
// Handles vended by `ResourceCache::use_data`. A handle counts as one claim
// on its entry for as long as it lives.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::async_result::AsyncResult;
use crate::cache::{EntryCollection, StateTx};

/// A live subscription to one cache entry.
///
/// Read the state with [`current`](Self::current), wait for transitions with
/// [`changed`](Self::changed), or block on the outcome with
/// [`suspend`](Self::suspend). Dropping the handle releases the entry.
pub struct DataHandle<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    collection: Arc<EntryCollection<O, E>>,
    key: String,
    state: StateTx<O, E>,
    receiver: watch::Receiver<AsyncResult<O, E>>,
}

impl<O, E> DataHandle<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(collection: Arc<EntryCollection<O, E>>, key: String, state: StateTx<O, E>) -> Self {
        let receiver = state.subscribe();
        Self {
            collection,
            key,
            state,
            receiver,
        }
    }

    /// Canonical key of the subscribed entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Latest state of the entry.
    pub fn current(&self) -> AsyncResult<O, E> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state transition, returning the new state.
    /// Returns `None` once nothing can update the entry anymore.
    pub async fn changed(&mut self) -> Option<AsyncResult<O, E>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the entry settles and return its outcome.
    ///
    /// Returns immediately for a settled entry. Concurrent callers on the
    /// same entry all resume on the same settlement.
    pub async fn suspend(&self) -> Result<O, E> {
        let mut receiver = self.receiver.clone();
        loop {
            let settled = receiver.borrow_and_update().clone().settled();
            if let Some(result) = settled {
                return result;
            }
            if receiver.changed().await.is_err() {
                // Nothing left to settle the entry: stay pending.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Convert into a `Stream` of states, starting with the current one.
    /// The claim is held until the stream is dropped.
    pub fn into_stream(self) -> DataStream<O, E> {
        DataStream {
            inner: WatchStream::new(self.receiver.clone()),
            _handle: self,
        }
    }
}

impl<O, E> Drop for DataHandle<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.collection.release(&self.key, &self.state);
    }
}

/// `Stream` adapter over a [`DataHandle`].
pub struct DataStream<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: WatchStream<AsyncResult<O, E>>,
    _handle: DataHandle<O, E>,
}

impl<O, E> Stream for DataStream<O, E>
where
    O: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Item = AsyncResult<O, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
