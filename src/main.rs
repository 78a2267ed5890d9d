use fixed_pool::ThreadPool;
use std::{error::Error, thread, time::{Duration, Instant}};
use tracing_subscriber::EnvFilter;


fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let now = Instant::now();
    let pool = ThreadPool::new(4)?;

    let handles = (0..8)
        .map(|i: u64| {
            pool.enqueue(move || {
                println!("hello {}", i);
                thread::sleep(Duration::from_secs(1));
                println!("world {}", i);
                i * i
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.join()?.to_string());
    }
    println!("{}", results.join(" "));

    pool.shutdown();
    println!("elapsed: {:?}", now.elapsed());
    Ok(())
}
