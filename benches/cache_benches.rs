use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use trestle::config::PoolConfig;
use trestle::exec::pool::PoolExecutor;
use trestle::prelude::*;

use rand::prelude::*;
use rand_distr::Pareto;
use std::sync::Arc;

fn pareto_keys(count: usize) -> Vec<u64> {
    let dist = Pareto::new(1., 5.0_f64.log(4.0_f64)).unwrap();
    let mut rng = thread_rng();
    (0..count)
        .map(|_| rng.sample(&dist).min(1_000.0) as u64)
        .collect()
}

fn skewed_lookups(cache: FutureCache<u64, u64>, keys: Arc<Vec<u64>>, thread_count: u64) {
    let mut threads = vec![];

    for thread_no in 0..thread_count {
        let cache = cache.clone();
        let keys = keys.clone();

        let t = std::thread::Builder::new()
            .name(format!("t_{}", thread_no))
            .spawn(move || {
                for k in keys.iter() {
                    cache.get(*k).unwrap();
                }
            })
            .unwrap();

        threads.push(t);
    }

    for t in threads.into_iter() {
        t.join().unwrap();
    }
}

fn bench_cache_pareto_hits(c: &mut Criterion) {
    let executor: ExecutorRef =
        Arc::new(PoolExecutor::new(PoolConfig::default().threads(4)).unwrap());
    let keys = Arc::new(pareto_keys(1_000));
    let threads = 8;

    let mut group = c.benchmark_group("cache_lookup_throughput");
    group.throughput(Throughput::Elements(threads * keys.len() as u64));
    group.bench_function("pareto keys, cold cache", move |b| {
        b.iter_batched(
            || {
                let cache = FutureCache::new(executor.clone(), |k: &u64| Ok(k.wrapping_mul(31)));
                (cache, keys.clone())
            },
            |vars| skewed_lookups(vars.0, vars.1, threads),
            BatchSize::SmallInput,
        )
    });
}

fn bench_cache_hot_key(c: &mut Criterion) {
    let executor: ExecutorRef =
        Arc::new(PoolExecutor::new(PoolConfig::default().threads(2)).unwrap());
    let cache = AsyncCache::new(executor, |k: &u64| Ok(*k));
    cache.set_value(0, 0);

    let mut group = c.benchmark_group("cache_hot_key");
    group.throughput(Throughput::Elements(1));
    group.bench_function("resolved handle", |b| {
        b.iter(|| cache.get_value(0).wait().unwrap().unwrap())
    });
}

criterion_group! {
    name = cache_benches;
    config = Criterion::default();
    targets = bench_cache_pareto_hits, bench_cache_hot_key
}
criterion_main!(cache_benches);
