use crate::errors::{SyncErrorType, SyncResult};

use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::Mutex;

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

struct Buffer<T> {
    items: VecDeque<T>,
    takers: VecDeque<oneshot::Sender<T>>,
}

type SharedBuffer<T> = Arc<Mutex<Buffer<T>>>;

///
/// Unbounded producer/consumer queue with asynchronous takes.
///
/// Items are handed out in the order they were added, and pending takes are served in
/// the order they were issued. A take issued on an empty queue waits for the next add.
/// Clones share the same queue.
pub struct AsyncQueue<T> {
    buffer: SharedBuffer<T>,
}

impl<T> AsyncQueue<T> {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                items: VecDeque::new(),
                takers: VecDeque::new(),
            })),
        }
    }

    ///
    /// Hand `item` to the oldest pending take, or buffer it when nobody waits.
    pub fn add(&self, item: T) {
        deliver(&self.buffer, item, false);
    }

    ///
    /// Take the next item. Resolves right away when an item is buffered.
    pub fn take(&self) -> Take<T> {
        let mut buffer = self.buffer.lock();
        if let Some(item) = buffer.items.pop_front() {
            return Take {
                state: TakeState::Ready(item),
                buffer: Arc::downgrade(&self.buffer),
            };
        }

        let (tx, rx) = oneshot::channel();
        buffer.takers.push_back(tx);

        Take {
            state: TakeState::Waiting(rx),
            buffer: Arc::downgrade(&self.buffer),
        }
    }

    ///
    /// Take the next item, blocking the calling thread until there is one.
    pub fn take_blocking(&self) -> SyncResult<T> {
        self.take().wait()
    }

    ///
    /// Take a buffered item without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.buffer.lock().items.pop_front()
    }

    ///
    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.buffer.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    ///
    /// Number of takes waiting for an item.
    pub fn pending_takers(&self) -> usize {
        self.buffer
            .lock()
            .takers
            .iter()
            .filter(|t| !t.is_canceled())
            .count()
    }
}

impl<T: Clone> AsyncQueue<T> {
    ///
    /// Snapshot of the buffered items, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.buffer.lock().items.iter().cloned().collect()
    }
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
        }
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.buffer.lock();
        f.debug_struct("AsyncQueue")
            .field("items", &buffer.items.len())
            .field("takers", &buffer.takers.len())
            .finish()
    }
}

// Senders are completed outside of the lock, waking a taker may run its continuation inline.
fn deliver<T>(buffer: &Mutex<Buffer<T>>, mut item: T, front: bool) {
    loop {
        let taker = {
            let mut buffer = buffer.lock();
            match buffer.takers.pop_front() {
                Some(taker) => taker,
                None => {
                    if front {
                        buffer.items.push_front(item);
                    } else {
                        buffer.items.push_back(item);
                    }
                    return;
                }
            }
        };

        match taker.send(item) {
            Ok(()) => return,
            // Taker went away, offer to the next one.
            Err(back) => item = back,
        }
    }
}

enum TakeState<T> {
    Ready(T),
    Waiting(oneshot::Receiver<T>),
    Done,
}

///
/// Pending take from an [AsyncQueue].
///
/// Dropping a take which already got an item delivered puts that item back at the
/// front of the queue.
#[must_use = "an item handed to a dropped take goes back to the queue"]
pub struct Take<T> {
    state: TakeState<T>,
    buffer: Weak<Mutex<Buffer<T>>>,
}

impl<T> Take<T> {
    ///
    /// Block the calling thread until the item arrives.
    pub fn wait(self) -> SyncResult<T> {
        futures::executor::block_on(self)
    }
}

// `T` is only ever moved out, never pinned.
impl<T> Unpin for Take<T> {}

impl<T> Future for Take<T> {
    type Output = SyncResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match std::mem::replace(&mut this.state, TakeState::Done) {
            TakeState::Ready(item) => Poll::Ready(Ok(item)),
            TakeState::Waiting(mut rx) => match rx.poll_unpin(cx) {
                Poll::Ready(r) => Poll::Ready(r.map_err(|_| SyncErrorType::Abandoned)),
                Poll::Pending => {
                    this.state = TakeState::Waiting(rx);
                    Poll::Pending
                }
            },
            TakeState::Done => Poll::Ready(Err(SyncErrorType::Abandoned)),
        }
    }
}

impl<T> Drop for Take<T> {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, TakeState::Done) {
            TakeState::Ready(item) => {
                if let Some(buffer) = self.buffer.upgrade() {
                    deliver(&buffer, item, true);
                }
            }
            TakeState::Waiting(mut rx) => {
                rx.close();
                if let Ok(Some(item)) = rx.try_recv() {
                    if let Some(buffer) = self.buffer.upgrade() {
                        deliver(&buffer, item, true);
                    }
                }
            }
            TakeState::Done => {}
        }
    }
}
