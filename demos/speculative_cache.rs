use trestle::prelude::*;

use std::thread;
use std::time::{Duration, Instant};

// Pages of a fake slow store. Reading page `n` usually means `n + 1` and `n + 2` come next.
fn load_page(page: &u32) -> anyhow::Result<String> {
    thread::sleep(Duration::from_millis(100));
    if *page > 6 {
        anyhow::bail!("page {} is past the end", page);
    }
    Ok(format!("contents of page {}", page))
}

fn main() -> anyhow::Result<()> {
    let trestle = trestle::build()?;
    let pages = trestle.make_speculative_cache(load_page, |page: &u32| vec![page + 1, page + 2]);

    for page in 0..8 {
        let started = Instant::now();
        match pages.get(page) {
            Ok(contents) => println!("{} in {:?}", contents, started.elapsed()),
            Err(e) => println!("page {} failed in {:?}: {}", page, started.elapsed(), e),
        }
        // Reader takes a while with every page, the next ones load meanwhile.
        thread::sleep(Duration::from_millis(150));
    }

    println!("{} pages cached", pages.len());
    Ok(())
}
