use crate::constants::DEFAULT_POOL_THREAD_NAME;

///
/// Configuration for the pooled executor.
///
/// Defaults to one worker per available core, named after the crate.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads. Zero lets the pool pick the number of logical cpus.
    pub threads: usize,
    /// Prefix of every worker thread name, suffixed with the worker index.
    pub thread_name: String,
    /// Stack size of every worker thread, platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            thread_name: DEFAULT_POOL_THREAD_NAME.into(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn pool_config_builder() {
        let cfg = PoolConfig::default()
            .threads(3)
            .thread_name("cfg-test")
            .stack_size(1 << 20);

        assert_eq!(cfg.threads, 3);
        assert_eq!(cfg.thread_name, "cfg-test");
        assert_eq!(cfg.stack_size, Some(1 << 20));
    }

    #[test]
    fn pool_config_default_name() {
        assert_eq!(PoolConfig::default().thread_name, DEFAULT_POOL_THREAD_NAME);
        assert_eq!(PoolConfig::default().threads, 0);
    }
}
