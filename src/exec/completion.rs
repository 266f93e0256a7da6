use crate::errors::{SyncErrorType, SyncResult};
use crate::exec::{spawn_future, ExecutorRef};

use futures::task::{waker, ArcWake};
use parking_lot::Mutex;

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

struct State<T> {
    value: Option<SyncResult<T>>,
    wakers: Vec<Waker>,
}

// Cell shared by a promise and all clones of its completion.
struct Slot<T> {
    state: Mutex<State<T>>,
    handles: AtomicUsize,
}

impl<T> Slot<T> {
    fn new(value: Option<SyncResult<T>>) -> Self {
        Self {
            state: Mutex::new(State {
                value,
                wakers: Vec::new(),
            }),
            handles: AtomicUsize::new(1),
        }
    }

    // Wakers run after the lock is released, a woken task may poll this slot right away.
    fn complete(&self, res: SyncResult<T>) {
        let wakers = {
            let mut state = self.state.lock();
            if state.value.is_some() {
                return;
            }
            state.value = Some(res);
            mem::take(&mut state.wakers)
        };

        wakers.into_iter().for_each(Waker::wake);
    }
}

///
/// Write side of a [Completion].
///
/// Fulfilling consumes the promise. Dropping it without a value resolves every
/// clone of the paired completion with [SyncErrorType::Abandoned].
pub struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T: Clone> Promise<T> {
    ///
    /// Create a connected promise/completion pair.
    pub fn new() -> (Promise<T>, Completion<T>) {
        let slot = Arc::new(Slot::new(None));
        (
            Promise {
                slot: Some(slot.clone()),
            },
            Completion { slot },
        )
    }
}

impl<T> Promise<T> {
    ///
    /// Complete the paired handle with the given value.
    ///
    /// Returns the value back when every completion clone is already gone.
    pub fn fulfil(mut self, value: T) -> Result<(), T> {
        match self.slot.take() {
            Some(slot) if slot.handles.load(Ordering::Acquire) > 0 => {
                slot.complete(Ok(value));
                Ok(())
            }
            _ => Err(value),
        }
    }

    ///
    /// Whether all completion clones have been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.slot
            .as_ref()
            .map_or(true, |slot| slot.handles.load(Ordering::Acquire) == 0)
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.complete(Err(SyncErrorType::Abandoned));
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

///
/// Cloneable handle to a value that is produced at most once.
///
/// Every clone observes the same value. The handle is a [Future], and also offers
/// blocking access through [Completion::wait] for callers outside of an async context.
pub struct Completion<T: Clone> {
    slot: Arc<Slot<T>>,
}

impl<T: Clone> Completion<T> {
    ///
    /// Handle which is already completed with the given value.
    pub fn ready(value: T) -> Self {
        Self {
            slot: Arc::new(Slot::new(Some(Ok(value)))),
        }
    }

    ///
    /// Query completion without blocking.
    pub fn is_complete(&self) -> bool {
        self.slot.state.lock().value.is_some()
    }

    ///
    /// Retrieve the result if it is already available.
    pub fn try_get(&self) -> Option<SyncResult<T>> {
        self.slot.state.lock().value.clone()
    }

    ///
    /// Block the calling thread until the value is available.
    pub fn wait(&self) -> SyncResult<T> {
        futures::executor::block_on(self.clone())
    }

    ///
    /// Block the calling thread up to `timeout` for the value.
    ///
    /// Gives [SyncErrorType::Timeout] if the value didn't arrive in time.
    pub fn wait_for(&self, timeout: Duration) -> SyncResult<T> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.wait(),
        };

        let waker = waker(Arc::new(ParkWaker(thread::current())));
        let mut cx = Context::from_waker(&waker);
        let mut fut = self.clone();

        loop {
            if let Poll::Ready(r) = Pin::new(&mut fut).poll(&mut cx) {
                break r;
            }

            let now = Instant::now();
            if now >= deadline {
                break Err(SyncErrorType::Timeout);
            }
            thread::park_timeout(deadline - now);
        }
    }

    ///
    /// Chain a continuation which runs on `executor` once this handle completes.
    ///
    /// The continuation doesn't occupy an executor worker while waiting.
    pub fn then_on<F, U>(&self, executor: &ExecutorRef, f: F) -> Completion<U>
    where
        T: Send + Sync + 'static,
        F: FnOnce(SyncResult<T>) -> U + Send + 'static,
        U: Clone + Send + 'static,
    {
        let (promise, completion) = Promise::new();
        let source = self.clone();

        spawn_future(executor, async move {
            let res = source.await;
            let _ = promise.fulfil(f(res));
        });

        completion
    }
}

impl<T: Clone> Clone for Completion<T> {
    fn clone(&self) -> Self {
        self.slot.handles.fetch_add(1, Ordering::AcqRel);
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone> Drop for Completion<T> {
    fn drop(&mut self) {
        self.slot.handles.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T: Clone> Future for Completion<T> {
    type Output = SyncResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.slot.state.lock();
        if let Some(res) = &state.value {
            return Poll::Ready(res.clone());
        }

        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("value", &self.try_get())
            .finish()
    }
}

struct ParkWaker(Thread);

impl ArcWake for ParkWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.unpark();
    }
}
