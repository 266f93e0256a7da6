/// Single assignment handles and their promises
pub mod completion;
/// Executor implementations shipped with the crate
pub mod pool;

use crate::exec::completion::{Completion, Promise};

use futures::future::BoxFuture;
use futures::task::{waker_ref, ArcWake};
use parking_lot::Mutex;

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::Context;

///
/// A unit of work accepted by an [Executor].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

///
/// Shared executor handle which primitives hold on to.
pub type ExecutorRef = Arc<dyn Executor>;

///
/// Anything that can run a zero-argument unit of work, now or later, on some thread.
///
/// Primitives never create their own workers; they are handed an executor at construction.
pub trait Executor: Send + Sync {
    fn execute(&self, work: Work);
}

impl<E> Executor for Arc<E>
where
    E: Executor + ?Sized,
{
    fn execute(&self, work: Work) {
        (**self).execute(work)
    }
}

///
/// Run `f` on the executor and hand back a completion for its result.
///
/// A panicking `f` abandons the completion.
pub fn spawn<E, F, T>(executor: &E, f: F) -> Completion<T>
where
    E: Executor + ?Sized,
    F: FnOnce() -> T + Send + 'static,
    T: Clone + Send + 'static,
{
    let (promise, completion) = Promise::new();
    executor.execute(Box::new(move || {
        let _ = promise.fulfil(f());
    }));
    completion
}

///
/// Drive a future to completion on the executor.
///
/// The future is polled on executor workers only when woken, it never parks a worker.
/// A wake that arrives while the future is being polled makes the running worker poll
/// it once more instead of scheduling a second run.
pub fn spawn_future<F>(executor: &ExecutorRef, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = Arc::new(FutureTask {
        future: Mutex::new(Some(Box::pin(fut))),
        state: AtomicU8::new(SCHEDULED),
        executor: executor.clone(),
    });
    task.submit();
}

// Task states. Only the worker which moved a task out of SCHEDULED polls it.
const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;
const NOTIFIED: u8 = 3;
const COMPLETE: u8 = 4;

struct FutureTask {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    state: AtomicU8,
    executor: ExecutorRef,
}

impl FutureTask {
    fn submit(self: Arc<Self>) {
        let executor = self.executor.clone();
        executor.execute(Box::new(move || self.run()));
    }

    fn run(self: Arc<Self>) {
        self.state.store(RUNNING, Ordering::SeqCst);

        let waker = waker_ref(&self);
        let mut cx = Context::from_waker(&*waker);
        let mut slot = self.future.lock();

        loop {
            let ready = match slot.as_mut() {
                Some(fut) => fut.as_mut().poll(&mut cx).is_ready(),
                None => true,
            };

            if ready {
                *slot = None;
                self.state.store(COMPLETE, Ordering::SeqCst);
                return;
            }

            match self
                .state
                .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                // Woken while polling.
                Err(_) => self.state.store(RUNNING, Ordering::SeqCst),
            }
        }
    }
}

impl ArcWake for FutureTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let mut state = arc_self.state.load(Ordering::Acquire);
        loop {
            let next = match state {
                IDLE => SCHEDULED,
                RUNNING => NOTIFIED,
                _ => return,
            };

            match arc_self.state.compare_exchange_weak(
                state,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if state == IDLE {
                        arc_self.clone().submit();
                    }
                    return;
                }
                Err(actual) => state = actual,
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

///
/// Prelude for executors and completion handles
pub mod prelude {
    pub use super::completion::*;
    pub use super::pool::*;
    pub use super::{spawn, spawn_future, Executor, ExecutorRef, Work};
}
