use trestle::exec::prelude::*;
use trestle::sync::prelude::*;

use crossbeam_utils::thread;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn barrier_reusable_across_phases() {
    let participants = 10;
    let barrier = AsyncBarrier::new(participants).unwrap();
    let arrived = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..participants {
            s.spawn(|_| {
                for phase in 0..2_u64 {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    let done = barrier.signal_and_wait().wait().unwrap();

                    assert_eq!(done, phase);
                    // Nobody leaves a phase before everybody got there.
                    assert!(arrived.load(Ordering::SeqCst) >= (phase as usize + 1) * participants);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(barrier.current_phase(), 2);
    assert_eq!(barrier.remaining_count(), participants);
}

#[test]
fn barrier_async_participants_on_pool() {
    let executor: ExecutorRef = Arc::new(PoolExecutor::with_defaults().unwrap());
    let barrier = Arc::new(AsyncBarrier::new(4).unwrap());
    let phases = 3_u64;

    let finished: Vec<_> = (0..4)
        .map(|_| {
            let barrier = barrier.clone();
            let (done, finished) = Promise::<u64>::new();
            spawn_future(&executor, async move {
                let mut last = 0;
                for _ in 0..phases {
                    last = barrier.signal_and_wait().await.unwrap();
                }
                let _ = done.fulfil(last);
            });
            finished
        })
        .collect();

    for f in finished {
        assert_eq!(f.wait_for(Duration::from_secs(5)).unwrap(), phases - 1);
    }
}

#[test]
fn latch_reset_then_released_by_workers() {
    let latch = CountdownLatch::new(0).unwrap();
    assert!(latch.wait_for(Duration::from_millis(1)));

    latch.reset(5).unwrap();
    assert!(!latch.wait_for(Duration::from_millis(1)));

    thread::scope(|s| {
        for _ in 0..5 {
            s.spawn(|_| {
                latch.set();
            });
        }

        latch.wait();
    })
    .unwrap();

    assert!(latch.is_set());
    assert_eq!(latch.count(), 0);
}

#[test]
fn latch_exactly_one_releaser() {
    let latch = CountdownLatch::new(64).unwrap();
    let releasers = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|_| {
                for _ in 0..10 {
                    if latch.set() {
                        releasers.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }
    })
    .unwrap();

    assert_eq!(releasers.load(Ordering::SeqCst), 1);
    assert!(latch.is_set());
}

#[test]
fn argument_errors_are_synchronous() {
    assert!(matches!(
        CountdownLatch::new(-3),
        Err(trestle::errors::SyncErrorType::InvalidArgument(_))
    ));
    assert!(matches!(
        AsyncBarrier::new(0),
        Err(trestle::errors::SyncErrorType::InvalidArgument(_))
    ));
}
