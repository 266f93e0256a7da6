use trestle::prelude::*;

use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let trestle = trestle::build()?;
    let workers = 4;
    let phases = 3_u64;

    let barrier = Arc::new(trestle.make_barrier(workers)?);
    let results = AsyncQueue::new();
    let done = Arc::new(trestle.make_latch(workers as i64)?);

    for worker in 0..workers {
        let barrier = barrier.clone();
        let results = results.clone();
        let done = done.clone();

        spawn_future(trestle.executor(), async move {
            for phase in 0..phases {
                results.add(format!("worker {} finished step {}", worker, phase));
                let completed = barrier.signal_and_wait().await;
                if let Ok(completed) = completed {
                    assert_eq!(completed, phase);
                }
            }
            done.set();
        });
    }

    if !done.wait_for(Duration::from_secs(10)) {
        anyhow::bail!("workers didn't finish in time");
    }

    while let Some(line) = results.try_take() {
        println!("{}", line);
    }
    println!("barrier is at phase {}", barrier.current_phase());

    Ok(())
}
