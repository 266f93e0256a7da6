use crate::constants::DEFAULT_CACHE_CAPACITY;
use crate::errors::{SyncErrorType, SyncResult};
use crate::exec::completion::{Completion, Promise};
use crate::exec::{panic_message, ExecutorRef};

use anyhow::anyhow;
use log::*;
use parking_lot::RwLock;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

///
/// Handle to a cached value, resolving to the value or to the error its computation
/// failed with.
pub type CacheHandle<V> = Completion<SyncResult<V>>;

pub(crate) type ComputeFn<K, V> = dyn Fn(&K) -> anyhow::Result<V> + Send + Sync;

// Runs on the computing worker once a value for the key is available.
pub(crate) type AfterHook<K, V> = Arc<dyn Fn(&AsyncCache<K, V>, &K) + Send + Sync>;

///
/// How an entry got into the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Produced by the cache's computation.
    Computed,
    /// Installed through `set_value` or `set_completion`.
    Explicit,
}

struct CacheEntry<V: Clone> {
    handle: CacheHandle<V>,
    origin: EntryOrigin,
}

struct CacheInner<K, V: Clone> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    compute: Box<ComputeFn<K, V>>,
    executor: ExecutorRef,
}

///
/// Memoizing cache over an asynchronous key to value computation.
///
/// For every key the computation runs at most once: concurrent requests for an
/// uncached key all observe the handle of a single scheduled computation. Computations
/// run on the executor given at construction.
///
/// A failed computation is kept. Every later request for the key observes the same
/// error until the key is reset with [AsyncCache::remove], [AsyncCache::set_value] or
/// [AsyncCache::clear].
///
/// Clones share the same entries.
pub struct AsyncCache<K, V: Clone> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> AsyncCache<K, V>
where
    K: 'static + Eq + Hash + Clone + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    pub fn new<F>(executor: ExecutorRef, compute: F) -> Self
    where
        F: Fn(&K) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::with_capacity(DEFAULT_CACHE_CAPACITY)),
                compute: Box::new(compute),
                executor,
            }),
        }
    }

    ///
    /// Get the handle for `key`, scheduling its computation if nothing is cached yet.
    ///
    /// Never fails synchronously, computation failures surface through the handle.
    pub fn get_value(&self, key: K) -> CacheHandle<V> {
        self.get_or_install(key, None, false).0
    }

    ///
    /// Seed `key` with a known value, superseding whatever is cached for it.
    pub fn set_value(&self, key: K, value: V) {
        self.install(key, Completion::ready(Ok(value)));
    }

    ///
    /// Seed `key` with a value which is still being produced elsewhere.
    ///
    /// If the given handle gets abandoned, the key resolves to [SyncErrorType::Abandoned].
    pub fn set_completion(&self, key: K, handle: Completion<V>) {
        self.install_completion(key, handle);
    }

    ///
    /// Drop every entry. Computations in flight still finish, but their results only
    /// reach handles obtained before the clear.
    pub fn clear(&self) {
        let mut entries = self.inner.entries.write();
        debug!("cache cleared, {} entries dropped", entries.len());
        entries.clear();
    }

    ///
    /// Drop the entry for `key`, returns whether there was one.
    ///
    /// This is how a key poisoned by a failed computation gets recomputed.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    ///
    /// Number of entries, pending computations included.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    ///
    /// Result for `key` if its entry is already resolved. Never schedules a computation.
    pub fn peek(&self, key: &K) -> Option<SyncResult<V>> {
        let handle = self.inner.entries.read().get(key)?.handle.clone();
        handle.try_get().map(|res| res.and_then(|v| v))
    }

    pub fn origin(&self, key: &K) -> Option<EntryOrigin> {
        self.inner.entries.read().get(key).map(|e| e.origin)
    }

    pub fn executor(&self) -> &ExecutorRef {
        &self.inner.executor
    }

    ///
    /// Returns the handle for `key` and whether this call installed it.
    ///
    /// `after` runs on the computing worker once the computation succeeded.
    pub(crate) fn get_or_install(
        &self,
        key: K,
        after: Option<AfterHook<K, V>>,
        speculative: bool,
    ) -> (CacheHandle<V>, bool) {
        if let Some(entry) = self.inner.entries.read().get(&key) {
            return (entry.handle.clone(), false);
        }

        let (promise, handle) = {
            let mut entries = self.inner.entries.write();
            // Somebody might have installed it between the two locks.
            if let Some(entry) = entries.get(&key) {
                return (entry.handle.clone(), false);
            }

            let (promise, handle) = Promise::new();
            entries.insert(
                key.clone(),
                CacheEntry {
                    handle: handle.clone(),
                    origin: EntryOrigin::Computed,
                },
            );
            (promise, handle)
        };

        trace!("cache miss, computation scheduled");
        self.schedule(key, promise, after, speculative);

        (handle, true)
    }

    ///
    /// Installs `handle` for `key` and gives back the entry's own handle.
    pub(crate) fn install_completion(&self, key: K, handle: Completion<V>) -> CacheHandle<V> {
        let handle = handle.then_on(&self.inner.executor, |res| res);
        self.install(key, handle.clone());
        handle
    }

    fn install(&self, key: K, handle: CacheHandle<V>) {
        self.inner.entries.write().insert(
            key,
            CacheEntry {
                handle,
                origin: EntryOrigin::Explicit,
            },
        );
    }

    fn schedule(
        &self,
        key: K,
        promise: Promise<SyncResult<V>>,
        after: Option<AfterHook<K, V>>,
        speculative: bool,
    ) {
        let cache = self.clone();
        self.inner.executor.execute(Box::new(move || {
            let res = cache.compute(&key, speculative);
            let succeeded = res.is_ok();
            let _ = promise.fulfil(res);

            if succeeded {
                if let Some(after) = after {
                    after(&cache, &key);
                }
            }
        }));
    }

    fn compute(&self, key: &K, speculative: bool) -> SyncResult<V> {
        let compute = &self.inner.compute;
        let err = match panic::catch_unwind(AssertUnwindSafe(|| compute(key))) {
            Ok(Ok(value)) => {
                trace!("cache computation completed");
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(payload) => anyhow!("computation panicked: {}", panic_message(&*payload)),
        };

        if speculative {
            warn!("speculative prefetch failed: {:#}", err);
        } else {
            debug!("cache computation failed: {:#}", err);
        }

        Err(SyncErrorType::computation(err))
    }
}

impl<K, V: Clone> Clone for AsyncCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V: Clone> fmt::Debug for AsyncCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCache")
            .field("entries", &self.inner.entries.read().len())
            .finish()
    }
}
