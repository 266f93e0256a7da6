use std::time::Duration;

///
/// Common surface of primitives which block callers until they get released.
pub trait WaitIface {
    ///
    /// Block until released.
    fn wait(&self);

    ///
    /// Block up to `timeout`. Returns whether the primitive got released.
    fn wait_for(&self, timeout: Duration) -> bool;

    ///
    /// Whether a wait would return right away.
    fn is_set(&self) -> bool;
}
