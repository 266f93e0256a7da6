use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use trestle::collections::prelude::*;

use rand::prelude::*;
use std::sync::Arc;

fn mixed_ops(set: Arc<SkipSet<u64>>, thread_count: u64, ops: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let set = set.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                let mut rng = thread_rng();
                for _ in 0..ops {
                    let k = rng.gen_range(0..4096_u64);
                    match rng.gen_range(0..10) {
                        0 => {
                            set.try_add(k);
                        }
                        1 => {
                            set.remove(&k);
                        }
                        _ => {
                            set.contains(&k);
                        }
                    }
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn bench_skiplist_mixed(c: &mut Criterion) {
    let set = {
        let set = SkipSet::with_expected_size(4096);
        (0..4096_u64).step_by(2).for_each(|k| {
            set.try_add(k);
        });
        Arc::new(set)
    };

    let threads = 8;
    let ops = 1_000;

    let mut group = c.benchmark_group("skiplist_mixed_throughput");
    group.throughput(Throughput::Elements(threads * ops));
    group.bench_function("80% contains", move |b| {
        b.iter_batched(
            || set.clone(),
            |set| mixed_ops(set, threads, ops),
            BatchSize::SmallInput,
        )
    });
}

fn bench_skiplist_sequential_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("skiplist_insert");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("1000 ascending keys", |b| {
        b.iter_batched(
            || SkipSet::with_expected_size(1_000),
            |set| {
                for k in 0..1_000_u32 {
                    set.try_add(k);
                }
                set
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group! {
    name = skiplist_benches;
    config = Criterion::default();
    targets = bench_skiplist_mixed, bench_skiplist_sequential_insert
}
criterion_main!(skiplist_benches);
