/// Memoizing cache with single-flight computations
pub mod async_cache;
/// Blocking sibling of the async cache
pub mod future_cache;
/// Cache prefetching related keys in the background
pub mod speculative;

///
/// Prelude for the caches
pub mod prelude {
    pub use super::async_cache::{AsyncCache, CacheHandle, EntryOrigin};
    pub use super::future_cache::*;
    pub use super::speculative::*;
}
