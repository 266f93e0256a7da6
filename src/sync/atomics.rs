use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

const DELETE_MARK: usize = 0b1;

// Marked pointer helpers.
//
// The lowest bit of a node pointer carries the logical deletion mark of the node
// that owns the link. Nodes are at least word aligned, so the bit is always free.

#[inline]
pub(crate) fn marked<T>(ptr: *mut T) -> *mut T {
    (ptr as usize | DELETE_MARK) as *mut T
}

#[inline]
pub(crate) fn unmarked<T>(ptr: *mut T) -> *mut T {
    (ptr as usize & !DELETE_MARK) as *mut T
}

#[inline]
pub(crate) fn is_marked<T>(ptr: *mut T) -> bool {
    (ptr as usize & DELETE_MARK) != 0
}

struct Retained<T> {
    node: *mut T,
    older: *mut Retained<T>,
}

///
/// Append-only arena which owns nodes of lock-free structures.
///
/// Once a node is published to other threads its ownership moves into the arena and it
/// stays allocated until the arena itself is dropped. Concurrent traversers can therefore
/// keep reading unlinked nodes without any reclamation protocol, and node addresses are
/// never reused while the structure is alive.
pub struct NodeArena<T> {
    head: AtomicPtr<Retained<T>>,
    len: AtomicUsize,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::default(),
        }
    }

    ///
    /// Allocate a node which is owned by the arena right away.
    pub fn alloc(&self, value: T) -> *mut T {
        let node = Box::into_raw(Box::new(value));
        // SAFETY: freshly boxed, never adopted.
        unsafe { self.adopt(node) };
        node
    }

    ///
    /// Hand ownership of a boxed node over to the arena.
    ///
    /// # Safety
    /// `node` must come from [Box::into_raw], and must not be adopted or freed elsewhere.
    pub unsafe fn adopt(&self, node: *mut T) {
        let entry = Box::into_raw(Box::new(Retained {
            node,
            older: ptr::null_mut(),
        }));

        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            (*entry).older = head;
            match self
                .head
                .compare_exchange_weak(head, entry, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        self.len.fetch_add(1, Ordering::Relaxed);
    }

    ///
    /// Number of nodes retained so far, live and unlinked alike.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for NodeArena<T> {
    fn drop(&mut self) {
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            unsafe {
                let entry = Box::from_raw(curr);
                drop(Box::from_raw(entry.node));
                curr = entry.older;
            }
        }
    }
}

impl<T> fmt::Debug for NodeArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeArena").field("len", &self.len()).finish()
    }
}

unsafe impl<T: Send> Send for NodeArena<T> {}
unsafe impl<T: Send + Sync> Sync for NodeArena<T> {}

#[cfg(test)]
mod arena_tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn marked_pointer_roundtrip() {
        let mut value = 10_u64;
        let p: *mut u64 = &mut value;

        assert!(!is_marked(p));
        assert!(is_marked(marked(p)));
        assert_eq!(unmarked(marked(p)), p);
        assert_eq!(unmarked(p), p);
    }

    #[test]
    fn arena_frees_everything_on_drop() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let arena = NodeArena::new();
            for _ in 0..100 {
                arena.alloc(DropCounter(drops.clone()));
            }
            assert_eq!(arena.len(), 100);
            assert_eq!(drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn arena_concurrent_adoption() {
        let arena = Arc::new(NodeArena::new());
        let thread_num = 8;
        let barrier = Arc::new(Barrier::new(thread_num));
        let mut guards = Vec::new();

        for _ in 0..thread_num {
            let arena = arena.clone();
            let b = barrier.clone();
            guards.push(thread::spawn(move || {
                b.wait();
                for i in 0..1000_usize {
                    let node = arena.alloc(i);
                    assert_eq!(unsafe { *node }, i);
                }
            }));
        }

        for g in guards {
            g.join().unwrap();
        }

        assert_eq!(arena.len(), thread_num * 1000);
    }
}
