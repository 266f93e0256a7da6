use crate::constants::{DEFAULT_MAX_HEIGHT, MAX_HEIGHT_LIMIT};
use crate::sync::atomics::{is_marked, marked, unmarked, NodeArena};

use rand::Rng;

use std::fmt;
use std::marker::PhantomData as marker;
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};

type Links<K> = [AtomicPtr<Node<K>>];

struct Node<K> {
    key: K,
    /// Forward pointers, one per level. The mark bit of `next[l]` says the node is
    /// deleted at level `l`; the mark at level 0 is the logical deletion of the node.
    next: Box<Links<K>>,
}

impl<K> Node<K> {
    fn new(key: K, height: usize) -> Self {
        Self {
            key,
            next: tower(height),
        }
    }
}

fn tower<K>(height: usize) -> Box<Links<K>> {
    (0..height)
        .map(|_| AtomicPtr::new(ptr::null_mut()))
        .collect::<Vec<_>>()
        .into_boxed_slice()
}

///
/// Lock-free ordered set built on a skip list.
///
/// All operations take `&self` and can be called from any number of threads.
/// Removed nodes are unlinked but stay allocated until the set is dropped, so
/// borrowed keys handed out by [SkipSet::iter] remain valid for the borrow.
pub struct SkipSet<K> {
    head: Box<Links<K>>,
    max_height: usize,
    len: AtomicIsize,
    arena: NodeArena<Node<K>>,
}

impl<K: Ord> SkipSet<K> {
    pub fn new() -> Self {
        Self::with_max_height(DEFAULT_MAX_HEIGHT)
    }

    ///
    /// Set with towers sized for roughly `expected` live keys.
    pub fn with_expected_size(expected: usize) -> Self {
        let bits = (std::mem::size_of::<usize>() * 8) as u32;
        let height = (bits - (expected.max(2) - 1).leading_zeros()) as usize;
        Self::with_max_height(height)
    }

    fn with_max_height(height: usize) -> Self {
        let max_height = height.max(1).min(MAX_HEIGHT_LIMIT);
        Self {
            head: tower(max_height),
            max_height,
            len: AtomicIsize::default(),
            arena: NodeArena::new(),
        }
    }

    pub fn max_height(&self) -> usize {
        self.max_height
    }

    ///
    /// Insert `key`. Gives `false` if the key is already present.
    pub fn try_add(&self, key: K) -> bool {
        let height = self.random_height();
        let mut preds = [&self.head[..]; MAX_HEIGHT_LIMIT];
        let mut succs = [ptr::null_mut(); MAX_HEIGHT_LIMIT];

        let node_ptr = Box::into_raw(Box::new(Node::new(key, height)));
        // SAFETY: owned by this call until published at level 0, then by the arena.
        let node = unsafe { &*node_ptr };

        loop {
            if self.find(&node.key, &mut preds, &mut succs) {
                // Never published.
                unsafe { drop(Box::from_raw(node_ptr)) };
                return false;
            }

            for (level, link) in node.next.iter().enumerate() {
                link.store(succs[level], Ordering::Relaxed);
            }

            if preds[0][0]
                .compare_exchange(succs[0], node_ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        unsafe { self.arena.adopt(node_ptr) };
        self.len.fetch_add(1, Ordering::Relaxed);

        for level in 1..height {
            loop {
                if preds[level][level]
                    .compare_exchange(succs[level], node_ptr, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break;
                }

                self.find(&node.key, &mut preds, &mut succs);

                // Removal already started, stop raising the tower.
                if is_marked(node.next[0].load(Ordering::Acquire)) {
                    return true;
                }

                let current = node.next[level].load(Ordering::Acquire);
                if is_marked(current) {
                    return true;
                }
                if current != succs[level]
                    && node.next[level]
                        .compare_exchange(current, succs[level], Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                {
                    return true;
                }
            }
        }

        true
    }

    ///
    /// Remove `key`. Gives `true` if this call removed it.
    pub fn remove(&self, key: &K) -> bool {
        let mut preds = [&self.head[..]; MAX_HEIGHT_LIMIT];
        let mut succs = [ptr::null_mut(); MAX_HEIGHT_LIMIT];

        if !self.find(key, &mut preds, &mut succs) {
            return false;
        }

        // SAFETY: nodes are only freed with the arena.
        let node = unsafe { &*succs[0] };

        for level in (1..node.next.len()).rev() {
            let mut succ = node.next[level].load(Ordering::Acquire);
            while !is_marked(succ) {
                match node.next[level].compare_exchange(
                    succ,
                    marked(succ),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(actual) => succ = actual,
                }
            }
        }

        // Whoever marks level 0 owns the removal.
        let mut succ = node.next[0].load(Ordering::Acquire);
        loop {
            if is_marked(succ) {
                return false;
            }

            match node.next[0].compare_exchange(
                succ,
                marked(succ),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    // Physically unlink on every level.
                    self.find(key, &mut preds, &mut succs);
                    return true;
                }
                Err(actual) => succ = actual,
            }
        }
    }

    ///
    /// Membership test. Never writes to shared state.
    pub fn contains(&self, key: &K) -> bool {
        let mut pred: &Links<K> = &self.head;
        let mut curr: *mut Node<K> = ptr::null_mut();

        for level in (0..self.max_height).rev() {
            curr = unmarked(pred[level].load(Ordering::Acquire));
            while let Some(node) = unsafe { curr.as_ref() } {
                let succ = node.next[level].load(Ordering::Acquire);
                if is_marked(succ) {
                    curr = unmarked(succ);
                    continue;
                }

                if node.key < *key {
                    pred = &node.next;
                    curr = succ;
                } else {
                    break;
                }
            }
        }

        match unsafe { curr.as_ref() } {
            Some(node) => node.key == *key && !is_marked(node.next[0].load(Ordering::Acquire)),
            None => false,
        }
    }

    ///
    /// Smallest key which is present.
    pub fn first(&self) -> Option<&K> {
        self.iter().next()
    }

    ///
    /// Best-effort count of present keys. Can be stale under concurrent mutation.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    ///
    /// Ascending iteration over present keys.
    ///
    /// Each call starts a fresh walk over the bottom level. Keys added or removed
    /// during the walk may or may not be observed, every yielded key was present
    /// when the walk passed it.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            next: unmarked(self.head[0].load(Ordering::Acquire)),
            marker,
        }
    }

    // Each trailing one is a won coin flip.
    fn random_height(&self) -> usize {
        let flips: u32 = rand::thread_rng().gen();
        (flips.trailing_ones() as usize + 1).min(self.max_height)
    }

    ///
    /// Locate the window for `key` at every level, unlinking deleted nodes on the way.
    ///
    /// Fills `preds[l]` with the links of the last node before `key` and `succs[l]` with
    /// the first node at or after `key`. Restarts from the head whenever an unlink loses
    /// a race.
    fn find<'a>(
        &'a self,
        key: &K,
        preds: &mut [&'a Links<K>; MAX_HEIGHT_LIMIT],
        succs: &mut [*mut Node<K>; MAX_HEIGHT_LIMIT],
    ) -> bool {
        'retry: loop {
            let mut pred: &'a Links<K> = &self.head;

            for level in (0..self.max_height).rev() {
                let mut curr = unmarked(pred[level].load(Ordering::Acquire));

                while let Some(node) = unsafe { curr.as_ref() } {
                    let succ = node.next[level].load(Ordering::Acquire);

                    if is_marked(succ) {
                        let next = unmarked(succ);
                        if pred[level]
                            .compare_exchange(curr, next, Ordering::AcqRel, Ordering::Acquire)
                            .is_err()
                        {
                            continue 'retry;
                        }
                        curr = next;
                        continue;
                    }

                    if node.key < *key {
                        pred = &node.next;
                        curr = succ;
                    } else {
                        break;
                    }
                }

                preds[level] = pred;
                succs[level] = curr;
            }

            break match unsafe { succs[0].as_ref() } {
                Some(node) => node.key == *key,
                None => false,
            };
        }
    }
}

impl<K: Ord> Default for SkipSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for SkipSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, K: Ord> IntoIterator for &'a SkipSet<K> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

unsafe impl<K: Send + Sync> Send for SkipSet<K> {}
unsafe impl<K: Send + Sync> Sync for SkipSet<K> {}

///
/// Lazy ascending walk over a [SkipSet].
pub struct Iter<'a, K> {
    next: *mut Node<K>,
    marker: marker<&'a SkipSet<K>>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        loop {
            // SAFETY: nodes outlive the borrow of the set.
            let node: &'a Node<K> = unsafe { self.next.as_ref()? };
            let succ = node.next[0].load(Ordering::Acquire);
            self.next = unmarked(succ);

            if !is_marked(succ) {
                return Some(&node.key);
            }
        }
    }
}
