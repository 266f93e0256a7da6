use super::async_cache::AsyncCache;
use crate::errors::SyncResult;
use crate::exec::completion::Completion;
use crate::exec::ExecutorRef;

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

///
/// Blocking face of [AsyncCache].
///
/// Lookups suspend the calling thread until the value is there. Calling [FutureCache::get]
/// from a worker of the executor which runs the computations can starve that executor.
pub struct FutureCache<K, V: Clone> {
    cache: AsyncCache<K, V>,
}

impl<K, V> FutureCache<K, V>
where
    K: 'static + Eq + Hash + Clone + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    pub fn new<F>(executor: ExecutorRef, compute: F) -> Self
    where
        F: Fn(&K) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        Self {
            cache: AsyncCache::new(executor, compute),
        }
    }

    ///
    /// Value for `key`, computing it on a miss and blocking until it is available.
    pub fn get(&self, key: K) -> SyncResult<V> {
        self.cache.get_value(key).wait().and_then(|res| res)
    }

    ///
    /// Like [FutureCache::get] but gives up after `timeout`.
    ///
    /// A timed out computation keeps running and lands in the cache.
    pub fn get_for(&self, key: K, timeout: Duration) -> SyncResult<V> {
        self.cache
            .get_value(key)
            .wait_for(timeout)
            .and_then(|res| res)
    }

    ///
    /// Resolved value for `key`, without blocking or computing.
    pub fn try_get(&self, key: &K) -> Option<SyncResult<V>> {
        self.cache.peek(key)
    }

    pub fn set(&self, key: K, value: V) {
        self.cache.set_value(key, value)
    }

    ///
    /// Seed `key` with a value which is still being produced elsewhere.
    pub fn set_completion(&self, key: K, handle: Completion<V>) {
        self.cache.set_completion(key, handle)
    }

    pub fn clear(&self) {
        self.cache.clear()
    }

    pub fn remove(&self, key: &K) -> bool {
        self.cache.remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    ///
    /// Asynchronous view over the same entries.
    pub fn as_async(&self) -> &AsyncCache<K, V> {
        &self.cache
    }
}

impl<K, V: Clone> From<AsyncCache<K, V>> for FutureCache<K, V> {
    fn from(cache: AsyncCache<K, V>) -> Self {
        Self { cache }
    }
}

impl<K, V: Clone> Clone for FutureCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<K, V: Clone> fmt::Debug for FutureCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FutureCache").field(&self.cache).finish()
    }
}
