use crate::constants::STACK_PARK_TIMEOUT;

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};

use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{self, AtomicIsize, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

///
/// Lock-free LIFO stack.
///
/// Push and pop are compare-and-swap loops on the head. Popped nodes are
/// reclaimed through epochs, so a concurrent popper never reads freed memory and
/// a recycled address can't fool a pending CAS.
///
/// [TreiberStack::pop] blocks on an empty stack: it spins for a short while, then
/// parks until a push arrives.
pub struct TreiberStack<T> {
    head: Atomic<Node<T>>,
    len: AtomicIsize,
    sleepers: AtomicUsize,
    lock: Mutex<()>,
    available: Condvar,
}

impl<T> TreiberStack<T> {
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
            len: AtomicIsize::default(),
            sleepers: AtomicUsize::default(),
            lock: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });
        let guard = epoch::pin();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            node.next.store(head, Ordering::Relaxed);

            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => break,
                Err(e) => {
                    node = e.new;
                    backoff.spin();
                }
            }
        }

        self.len.fetch_add(1, Ordering::Relaxed);

        // Pairs with the fence in `park`.
        atomic::fence(Ordering::SeqCst);
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.available.notify_all();
        }
    }

    ///
    /// Pop the most recently pushed value, or `None` right away if empty.
    pub fn try_pop(&self) -> Option<T> {
        let guard = epoch::pin();
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Ordering::Relaxed, &guard);

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: the CAS winner is the only reader of the value, the node
                // itself is destroyed once no pinned thread can still see it.
                unsafe {
                    let value = ManuallyDrop::into_inner(ptr::read(&node.value));
                    guard.defer_destroy(head);
                    return Some(value);
                }
            }

            backoff.spin();
        }
    }

    ///
    /// Pop the most recently pushed value, blocking while the stack is empty.
    pub fn pop(&self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.try_pop() {
                return value;
            }

            if backoff.is_completed() {
                self.park(None);
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    ///
    /// Pop, blocking up to `timeout` while the stack is empty.
    pub fn pop_for(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let backoff = Backoff::new();

        loop {
            if let Some(value) = self.try_pop() {
                return Some(value);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return None;
                }
            }

            if backoff.is_completed() {
                self.park(deadline);
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    ///
    /// Best-effort number of values on the stack.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    fn park(&self, deadline: Option<Instant>) {
        let mut guard = self.lock.lock();
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        atomic::fence(Ordering::SeqCst);

        if self.is_empty() {
            let timeout = deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .map_or(STACK_PARK_TIMEOUT, |left| left.min(STACK_PARK_TIMEOUT));
            self.available.wait_for(&mut guard, timeout);
        }

        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T> Default for TreiberStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for TreiberStack<T> {
    fn drop(&mut self) {
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let mut node = curr.into_owned();
                curr = node.next.load(Ordering::Relaxed, guard);
                ManuallyDrop::drop(&mut node.value);
            }
        }
    }
}

impl<T> fmt::Debug for TreiberStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreiberStack")
            .field("len", &self.len())
            .finish()
    }
}
