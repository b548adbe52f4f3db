//! Per-key load deduplication
//!
//! Concurrent cache misses for the same key attach to one pending load instead
//! of each issuing a storage fetch. The fetch runs on its own tokio task, so it
//! completes (and fills the cache) even if every waiter goes away, and its
//! pending entry is cleared either way.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

type PendingLoad<V> = Shared<BoxFuture<'static, Option<V>>>;

/// Registry of in-flight loads keyed by `K`
pub struct SingleFlight<K, V>
where
    V: Clone,
{
    pending: Arc<DashMap<K, PendingLoad<V>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key` unless a load for it is already pending, and wait
    /// for the shared result
    ///
    /// `fetch` is expected to put its result into the cache before resolving.
    /// `recheck` reads that cache and is consulted once no load is pending, which
    /// catches a load that finished between the caller's own cache miss and now.
    /// Resolves to `None` if the fetch yields nothing or its task panicked.
    pub async fn load<C, F, Fut>(&self, key: K, recheck: C, fetch: F) -> Option<V>
    where
        C: FnOnce() -> Option<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let load = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::trace!("Joining pending load for {:?}", key);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                if let Some(value) = recheck() {
                    return Some(value);
                }

                let fetch = fetch();
                let pending = Arc::clone(&self.pending);
                let task_key = key.clone();
                // Cleanup runs on the task and blocks on this shard until the insert below
                let task = tokio::spawn(async move {
                    let value = AssertUnwindSafe(fetch)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            tracing::error!("Load task for {:?} panicked", task_key);
                            None
                        });
                    // Cache is already filled, so later misses hit it or recheck it
                    pending.remove(&task_key);
                    value
                });

                let load = async move {
                    match task.await {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::error!("Load task for {:?} failed: {}", key, e);
                            None
                        }
                    }
                }
                .boxed()
                .shared();

                entry.insert(load.clone());
                load
            }
        };

        load.await
    }

    /// Number of loads currently pending
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Check if a load for `key` is pending
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }
}
