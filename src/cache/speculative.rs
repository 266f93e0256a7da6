use super::async_cache::{AfterHook, AsyncCache, CacheHandle};
use crate::errors::SyncResult;
use crate::exec::completion::Completion;
use crate::exec::{panic_message, ExecutorRef};

use log::*;

use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

///
/// Cache which prefetches related keys in the background.
///
/// Once a value for key `K` is available, either computed or set, the generator is
/// asked for keys related to `K` and every one of them which isn't cached yet gets
/// computed on the executor through the same single-flight path as a regular miss.
///
/// Prefetching is advisory. It never delays the request which triggered it and its
/// failures are only logged; a failed prefetch poisons its key like any other failed
/// computation would. Prefetched values don't trigger further prefetching.
pub struct FutureSpeculativeCache<K, V: Clone> {
    cache: AsyncCache<K, V>,
    prefetch: AfterHook<K, V>,
}

impl<K, V> FutureSpeculativeCache<K, V>
where
    K: 'static + Eq + Hash + Clone + Send + Sync,
    V: 'static + Clone + Send + Sync,
{
    pub fn new<F, G>(executor: ExecutorRef, compute: F, generator: G) -> Self
    where
        F: Fn(&K) -> anyhow::Result<V> + Send + Sync + 'static,
        G: Fn(&K) -> Vec<K> + Send + Sync + 'static,
    {
        let prefetch: AfterHook<K, V> = Arc::new(move |cache: &AsyncCache<K, V>, key: &K| {
            let related = match panic::catch_unwind(AssertUnwindSafe(|| generator(key))) {
                Ok(related) => related,
                Err(payload) => {
                    warn!(
                        "speculative key generator panicked: {}",
                        panic_message(&*payload)
                    );
                    return;
                }
            };

            let mut scheduled = 0_usize;
            for k in related {
                if cache.contains_key(&k) {
                    continue;
                }
                if cache.get_or_install(k, None, true).1 {
                    scheduled += 1;
                }
            }

            if scheduled > 0 {
                debug!("{} speculative computations scheduled", scheduled);
            }
        });

        Self {
            cache: AsyncCache::new(executor, compute),
            prefetch,
        }
    }

    ///
    /// Handle for `key`. A miss schedules the computation and, once it succeeds, the
    /// prefetch of the related keys.
    pub fn get_value(&self, key: K) -> CacheHandle<V> {
        self.cache
            .get_or_install(key, Some(self.prefetch.clone()), false)
            .0
    }

    ///
    /// Blocking lookup, see [FutureSpeculativeCache::get_value].
    pub fn get(&self, key: K) -> SyncResult<V> {
        self.get_value(key).wait().and_then(|res| res)
    }

    ///
    /// Seed `key` with a value and prefetch the keys related to it.
    pub fn set_value(&self, key: K, value: V) {
        self.cache.set_value(key.clone(), value);

        let cache = self.cache.clone();
        let prefetch = self.prefetch.clone();
        self.cache
            .executor()
            .execute(Box::new(move || prefetch(&cache, &key)));
    }

    ///
    /// Seed `key` with a value which is still being produced elsewhere.
    ///
    /// The related keys are prefetched once the handle resolves successfully.
    pub fn set_completion(&self, key: K, handle: Completion<V>) {
        let entry = self.cache.install_completion(key.clone(), handle);

        let cache = self.cache.clone();
        let prefetch = self.prefetch.clone();
        let _ = entry.then_on(self.cache.executor(), move |res| {
            if let Ok(Ok(_)) = res {
                prefetch(&cache, &key);
            }
        });
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

    pub fn peek(&self, key: &K) -> Option<SyncResult<V>> {
        self.cache.peek(key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    ///
    /// Plain cache over the same entries. Lookups through it don't prefetch.
    pub fn as_async(&self) -> &AsyncCache<K, V> {
        &self.cache
    }
}

impl<K, V: Clone> Clone for FutureSpeculativeCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            prefetch: self.prefetch.clone(),
        }
    }
}

impl<K, V: Clone> fmt::Debug for FutureSpeculativeCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FutureSpeculativeCache")
            .field(&self.cache)
            .finish()
    }
}

#[cfg(test)]
mod speculative_tests {
    use super::*;
    use crate::exec::completion::Promise;
    use crate::exec::pool::InlineExecutor;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn next_two(k: &u32) -> Vec<u32> {
        vec![k + 1, k + 2]
    }

    #[test]
    fn speculative_prefetches_related_keys() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            move |k: &u32| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(k * 2)
            },
            next_two,
        );

        assert_eq!(cache.get(10).unwrap(), 20);

        // Inline executor: the prefetch already ran, and didn't cascade.
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.peek(&11).unwrap().unwrap(), 22);
        assert_eq!(cache.peek(&12).unwrap().unwrap(), 24);
        assert!(!cache.contains_key(&13));

        // Prefetched keys are plain hits.
        assert_eq!(cache.get(11).unwrap(), 22);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn speculative_skips_cached_keys() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            move |k: &u32| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(*k)
            },
            next_two,
        );

        cache.set_value(1, 100);
        // 2 and 3 were prefetched off the explicit value.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(1).unwrap(), 100);

        assert_eq!(cache.get(2).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn speculative_failure_does_not_reach_caller() {
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            |k: &u32| {
                if *k == 6 {
                    bail!("no value for six");
                }
                Ok(*k)
            },
            |k: &u32| vec![k + 1],
        );

        assert_eq!(cache.get(5).unwrap(), 5);
        assert!(cache.peek(&6).unwrap().is_err());
    }

    #[test]
    fn speculative_generator_panic_is_contained() {
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            |k: &u32| Ok(*k),
            |_: &u32| -> Vec<u32> { panic!("generator exploded") },
        );

        assert_eq!(cache.get(1).unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn speculative_failed_primary_skips_prefetch() {
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            |_: &u32| -> anyhow::Result<u32> { bail!("always") },
            next_two,
        );

        assert!(cache.get(1).is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn speculative_set_completion_prefetches_on_fulfil() {
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            |k: &u32| Ok(k * 3),
            next_two,
        );
        let (p, c) = Promise::new();

        cache.set_completion(7, c);
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(&7).is_none());

        p.fulfil(70).unwrap();

        assert_eq!(cache.peek(&7).unwrap().unwrap(), 70);
        assert_eq!(cache.peek(&8).unwrap().unwrap(), 24);
        assert_eq!(cache.peek(&9).unwrap().unwrap(), 27);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn speculative_set_completion_abandoned_skips_prefetch() {
        let cache = FutureSpeculativeCache::new(
            Arc::new(InlineExecutor),
            |k: &u32| Ok(*k),
            next_two,
        );
        let (p, c) = Promise::new();

        cache.set_completion(1, c);
        drop(p);

        assert!(cache.peek(&1).unwrap().is_err());
        assert_eq!(cache.len(), 1);
    }
}
