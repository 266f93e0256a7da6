use crate::config::PoolConfig;
use crate::constants::DEFAULT_THREAD_EXECUTOR_NAME;
use crate::exec::{panic_message, Executor, Work};

use anyhow::*;
use log::*;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

///
/// Executor backed by a fixed size work-stealing pool.
///
/// A panic inside a unit of work is logged and doesn't bring the worker down.
pub struct PoolExecutor {
    pool: rayon::ThreadPool,
}

impl PoolExecutor {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let name = config.thread_name.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(move |idx| format!("{}-{}", name, idx))
            .panic_handler(|payload| {
                error!("work unit panicked: {}", panic_message(&*payload));
            });

        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let pool = builder
            .build()
            .context("Couldn't build executor pool")?;

        info!(
            "executor pool `{}` started with {} workers",
            config.thread_name,
            pool.current_num_threads()
        );

        Ok(Self { pool })
    }

    ///
    /// Pool with [PoolConfig::default] settings.
    pub fn with_defaults() -> Result<Self> {
        Self::new(PoolConfig::default())
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for PoolExecutor {
    #[inline]
    fn execute(&self, work: Work) {
        self.pool.spawn(work);
    }
}

impl fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

///
/// Executor which starts a dedicated named thread for every unit of work.
#[derive(Debug)]
pub struct ThreadExecutor {
    name: String,
    spawned: AtomicU64,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self::named(DEFAULT_THREAD_EXECUTOR_NAME)
    }

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            spawned: AtomicU64::default(),
        }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, work: Work) {
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.name, id))
            .spawn(work);

        if let Err(e) = spawned {
            // The work is lost together with the closure; callers see their handles abandoned.
            error!("couldn't start thread for work unit {}: {}", id, e);
        }
    }
}

///
/// Executor which runs work immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    #[inline]
    fn execute(&self, work: Work) {
        work()
    }
}

#[cfg(test)]
mod pool_tests {
    use super::*;
    use crate::exec::spawn;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn pool_runs_work() {
        let pool = PoolExecutor::new(PoolConfig::default().threads(2)).unwrap();
        assert_eq!(pool.threads(), 2);

        let handles: Vec<_> = (0..16_u64).map(|i| spawn(&pool, move || i * i)).collect();
        let total: u64 = handles.iter().map(|h| h.wait().unwrap()).sum();

        assert_eq!(total, (0..16_u64).map(|i| i * i).sum());
    }

    #[test]
    fn pool_survives_panicking_work() {
        let pool = PoolExecutor::new(PoolConfig::default().threads(1)).unwrap();

        let failed = spawn(&pool, || -> u8 { panic!("boom") });
        assert!(failed.wait().is_err());

        let ok = spawn(&pool, || 1_u8);
        assert_eq!(ok.wait().unwrap(), 1);
    }

    #[test]
    fn pool_thread_names() {
        let pool = PoolExecutor::new(PoolConfig::default().threads(1).thread_name("named")).unwrap();
        let name = spawn(&pool, || thread::current().name().map(String::from));

        assert_eq!(name.wait().unwrap().as_deref(), Some("named-0"));
    }

    #[test]
    fn thread_executor_runs_everything() {
        let executor = ThreadExecutor::named("te");
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                spawn(&executor, move || counter.fetch_add(1, Ordering::SeqCst))
            })
            .collect();

        for h in handles {
            h.wait().unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn inline_executor_is_synchronous() {
        let hit = Arc::new(AtomicUsize::new(0));
        let h = hit.clone();

        InlineExecutor.execute(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }
}
