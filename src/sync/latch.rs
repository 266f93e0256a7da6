use super::ifaces::WaitIface;
use crate::errors::{SyncErrorType, SyncResult};

use log::*;
use parking_lot::{Condvar, Mutex};

use std::convert::TryFrom;
use std::fmt;
use std::time::{Duration, Instant};

///
/// Countdown latch which releases every waiter once its count reaches zero.
///
/// Unlike a one-shot latch it can be rearmed with [CountdownLatch::reset].
pub struct CountdownLatch {
    count: Mutex<usize>,
    released: Condvar,
}

fn checked_count(count: i64) -> SyncResult<usize> {
    usize::try_from(count).map_err(|_| {
        SyncErrorType::InvalidArgument(format!("latch count can't be negative: {}", count))
    })
}

impl CountdownLatch {
    ///
    /// New latch with the given count. Negative counts are rejected.
    pub fn new(count: i64) -> SyncResult<Self> {
        Ok(Self {
            count: Mutex::new(checked_count(count)?),
            released: Condvar::new(),
        })
    }

    ///
    /// Decrement the count by one.
    ///
    /// Returns `true` when this call brought the count to zero and released the waiters.
    /// Signalling an already released latch does nothing.
    pub fn set(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }

        *count -= 1;
        if *count == 0 {
            self.released.notify_all();
            trace!("latch released");
            true
        } else {
            false
        }
    }

    ///
    /// Rearm the latch with a new count.
    pub fn reset(&self, count: i64) -> SyncResult<()> {
        let count = checked_count(count)?;
        let mut current = self.count.lock();
        *current = count;
        if count == 0 {
            self.released.notify_all();
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}

impl WaitIface for CountdownLatch {
    fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.released.wait(&mut count);
        }
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                self.wait();
                return true;
            }
        };

        let mut count = self.count.lock();
        while *count > 0 {
            if self.released.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    fn is_set(&self) -> bool {
        self.count() == 0
    }
}

impl fmt::Debug for CountdownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownLatch")
            .field("count", &self.count())
            .finish()
    }
}
