use std::time::Duration;

/// Skip list tower height used when no expected size is given.
pub const DEFAULT_MAX_HEIGHT: usize = 16_usize;
/// Upper bound for any skip list tower.
pub const MAX_HEIGHT_LIMIT: usize = 32_usize;

pub(crate) const DEFAULT_POOL_THREAD_NAME: &str = "trestle-worker";
pub(crate) const DEFAULT_THREAD_EXECUTOR_NAME: &str = "trestle-thread";

/// Upper bound on a single park of a blocked stack popper before it re-checks the head.
pub(crate) const STACK_PARK_TIMEOUT: Duration = Duration::from_millis(10);

pub(crate) const DEFAULT_CACHE_CAPACITY: usize = 64_usize;
