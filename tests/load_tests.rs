#[cfg(test)]
mod tests {
    use fixed_pool::{
        errors::SpawnError,
        pool::{Config, ThreadPool},
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    #[test]
    fn load_test_1_small_fast_tasks() {
        println!("\n=== LOAD TEST 1: 10k fast tasks ===");
        let pool = ThreadPool::with_config(Config::io_bound()).unwrap();

        let results: Vec<_> = measure("10k tasks", || {
            let handles: Vec<_> = (0..10_000u64)
                .map(|x| pool.enqueue(move || x * 2).unwrap())
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        assert_eq!(results.len(), 10_000);
        assert!(results.iter().all(|r| r.is_ok()));
        pool.shutdown();

        let metrics = pool.metrics();
        println!("  Completed: {}/{}", metrics.completed_tasks, results.len());
        assert_eq!(metrics.completed_tasks, 10_000);
        assert_eq!(metrics.pending(), 0);
    }

    #[test]
    fn load_test_2_blocking_tasks() {
        println!("\n=== LOAD TEST 2: 200 blocking tasks on 8 workers ===");
        let pool = ThreadPool::new(8).unwrap();

        let sum: u64 = measure("200 blocking tasks @ 5ms", || {
            let handles: Vec<_> = (0..200u64)
                .map(|i| pool.enqueue(move || {
                    thread::sleep(Duration::from_millis(5));
                    i * i
                }).unwrap())
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(sum, (0..200u64).map(|i| i * i).sum::<u64>());
    }

    #[test]
    fn load_test_3_stress_with_panics() {
        println!("\n=== LOAD TEST 3: stress with panics ===");

        // keep intentional panics out of the test output
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));

        let pool = ThreadPool::new(8).unwrap();
        let results: Vec<_> = measure("1k tasks (10% panic)", || {
            let handles: Vec<_> = (0..1_000)
                .map(|x| pool.enqueue(move || {
                    if x % 10 == 0 {
                        panic!("Intentional panic at {}", x);
                    }
                    x
                }).unwrap())
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        std::panic::set_hook(default_hook);

        let successful = results.iter().filter(|r| r.is_ok()).count();
        let panicked = results.iter().filter(|r| matches!(r, Err(SpawnError::Panic(_)))).count();
        println!("  Successful: {}", successful);
        println!("  Panics caught: {}", panicked);

        assert_eq!(successful, 900);
        assert_eq!(panicked, 100);
        assert_eq!(results[10], Err(SpawnError::Panic("Intentional panic at 10".into())));

        pool.shutdown();
        let metrics = pool.metrics();
        println!("  Pool success rate: {:.1}%", metrics.success_rate() * 100.0);
        assert_eq!(metrics.panicked_tasks, 100);
        assert!((metrics.success_rate() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn load_test_4_drain_many_more_tasks_than_workers() {
        println!("\n=== LOAD TEST 4: drain 5k tasks on 2 workers ===");
        let pool = ThreadPool::new(2).unwrap();
        let executed = Arc::new(AtomicUsize::new(0));

        for _ in 0..5_000 {
            let executed = executed.clone();
            // handles dropped on purpose: drain must not depend on them
            let _ = pool.enqueue(move || {
                executed.fetch_add(1, Ordering::Relaxed);
            });
        }

        measure("shutdown with full queue", || pool.shutdown());
        assert_eq!(executed.load(Ordering::Relaxed), 5_000);
    }

    #[test]
    fn load_test_5_many_submitter_threads() {
        println!("\n=== LOAD TEST 5: 16 submitters x 1k tasks ===");
        let pool = Arc::new(ThreadPool::with_config(Config::cpu_bound()).unwrap());

        let submitters: Vec<_> = (0..16usize)
            .map(|t| {
                let pool = pool.clone();
                thread::spawn(move || {
                    (0..1_000usize)
                        .map(|i| pool.enqueue(move || t ^ i).unwrap())
                        .collect::<Vec<_>>()
                        .into_iter()
                        .map(|h| h.join().unwrap())
                        .count()
                })
            })
            .collect();

        let total: usize = measure("16k tasks", || {
            submitters.into_iter().map(|s| s.join().unwrap()).sum()
        });
        assert_eq!(total, 16_000);

        let metrics = pool.metrics();
        println!("  Total submitted: {}", metrics.total_submitted);
        println!("  Utilization: {:.1}%", metrics.utilization() * 100.0);
        assert_eq!(metrics.total_submitted, 16_000);
    }
}
