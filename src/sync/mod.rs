/// Ifaces for blocking coordination primitives
pub mod ifaces;

/// Node arena and marked pointers for lock-free structures
pub mod atomics;

/// Reusable phased barrier with asynchronous waits
pub mod barrier;
/// Resettable countdown latch
pub mod latch;

///
/// Prelude for the synchronization primitives
pub mod prelude {
    pub use super::barrier::*;
    pub use super::ifaces::*;
    pub use super::latch::*;
}
