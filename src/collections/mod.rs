/// Producer/consumer queue with asynchronous takes
pub mod pcqueue;
/// Lock-free ordered set
pub mod skiplist;
/// Lock-free stack
pub mod treiber;

///
/// Prelude for the concurrent collections
pub mod prelude {
    pub use super::pcqueue::*;
    pub use super::skiplist::*;
    pub use super::treiber::*;
}
