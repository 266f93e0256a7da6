//!
//! Concurrent and asynchronous coordination primitives.
//!
//! Lock-free collections, blocking and asynchronous synchronization primitives and
//! memoizing caches whose computations run on an injected [Executor](exec::Executor).
//! Nothing in the crate resolves a global executor.

/// Cache errors and the crate wide result type
pub mod errors;
/// Crate wide defaults
pub mod constants;
/// Executor configuration
pub mod config;
/// Executors and completion handles
pub mod exec;
/// Synchronization primitives exposed by Trestle
pub mod sync;
/// Concurrent collections
pub mod collections;
/// Memoizing caches over asynchronous computations
pub mod cache;

use std::hash::Hash;
use std::sync::Arc;

use crate::cache::prelude::*;
use crate::collections::prelude::*;
use crate::errors::SyncResult;
use crate::exec::pool::PoolExecutor;
use crate::exec::ExecutorRef;
use crate::sync::prelude::*;
use anyhow::*;

///
/// Handle that owns an executor and builds the primitives which need one.
///
/// Once built it can be passed around with simple clone; every clone hands the same
/// executor to what it builds.
#[derive(Clone)]
pub struct Trestle(ExecutorRef);

///
/// Instantiate trestle with a default sized worker pool
pub fn build() -> Result<Trestle> {
    Ok(Trestle(Arc::new(PoolExecutor::with_defaults()?)))
}

impl Trestle {
    ///
    /// Trestle handle over a caller supplied executor.
    pub fn with_executor(executor: ExecutorRef) -> Self {
        Trestle(executor)
    }

    pub fn executor(&self) -> &ExecutorRef {
        &self.0
    }

    ///
    /// Builder method for a memoizing asynchronous cache.
    pub fn make_async_cache<K, V, F>(&self, compute: F) -> AsyncCache<K, V>
    where
        K: 'static + Eq + Hash + Clone + Send + Sync,
        V: 'static + Clone + Send + Sync,
        F: Fn(&K) -> Result<V> + Send + Sync + 'static,
    {
        AsyncCache::new(self.0.clone(), compute)
    }

    ///
    /// Builder method for a memoizing cache with blocking lookups.
    pub fn make_future_cache<K, V, F>(&self, compute: F) -> FutureCache<K, V>
    where
        K: 'static + Eq + Hash + Clone + Send + Sync,
        V: 'static + Clone + Send + Sync,
        F: Fn(&K) -> Result<V> + Send + Sync + 'static,
    {
        FutureCache::new(self.0.clone(), compute)
    }

    ///
    /// Builder method for a cache prefetching the keys `generator` relates to a computed one.
    pub fn make_speculative_cache<K, V, F, G>(
        &self,
        compute: F,
        generator: G,
    ) -> FutureSpeculativeCache<K, V>
    where
        K: 'static + Eq + Hash + Clone + Send + Sync,
        V: 'static + Clone + Send + Sync,
        F: Fn(&K) -> Result<V> + Send + Sync + 'static,
        G: Fn(&K) -> Vec<K> + Send + Sync + 'static,
    {
        FutureSpeculativeCache::new(self.0.clone(), compute, generator)
    }

    pub fn make_barrier(&self, participants: usize) -> SyncResult<AsyncBarrier> {
        AsyncBarrier::new(participants)
    }

    pub fn make_latch(&self, count: i64) -> SyncResult<CountdownLatch> {
        CountdownLatch::new(count)
    }

    pub fn make_queue<T>(&self) -> AsyncQueue<T> {
        AsyncQueue::new()
    }

    pub fn make_skip_set<K: Ord>(&self, expected_size: usize) -> SkipSet<K> {
        SkipSet::with_expected_size(expected_size)
    }

    pub fn make_stack<T>(&self) -> TreiberStack<T> {
        TreiberStack::new()
    }
}

impl std::fmt::Debug for Trestle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trestle").finish()
    }
}

///
/// Prelude of trestle
pub mod prelude {
    pub use crate::cache::prelude::*;
    pub use crate::collections::prelude::*;
    pub use crate::errors::*;
    pub use crate::exec::prelude::*;
    pub use crate::sync::prelude::*;
    pub use crate::{build, Trestle};
}
