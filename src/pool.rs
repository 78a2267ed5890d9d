use super::{
    errors::PoolError,
    handle::{self, Job, JoinHandle},
    model::PoolMetrics,
};
use std::{
    collections::VecDeque,
    fmt,
    io,
    mem,
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
};
use tracing::{debug, error, trace, warn};


const DEFAULT_THREAD_NAME: &str = "fixed-pool";

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    /// Worker threads are named `"{thread_name}-{index}"`.
    pub thread_name: Option<String>,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name: None,
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self::default()
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}


struct State {
    queue: VecDeque<Job>,
    stop: bool,
    live_workers: usize,
    worker_ids: Vec<thread::ThreadId>,
    // workers currently inside `shutdown`, removed again when they exit
    stopping_workers: Vec<thread::ThreadId>,
}

struct Shared {
    state: Mutex<State>,
    condvar: Condvar,
    exited: Condvar,
    active_tasks: AtomicUsize,
    completed_tasks: AtomicUsize,
    total_submitted: AtomicUsize,
    // cloned into every job, which must not hold the whole `Shared`
    panicked_tasks: Arc<AtomicUsize>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                stop: false,
                live_workers: 0,
                worker_ids: Vec::new(),
                stopping_workers: Vec::new(),
            }),
            condvar: Condvar::new(),
            exited: Condvar::new(),
            active_tasks: AtomicUsize::new(0),
            completed_tasks: AtomicUsize::new(0),
            total_submitted: AtomicUsize::new(0),
            panicked_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, job: Job) -> Result<(), PoolError> {
        {
            let mut state = self.lock();
            if state.stop {
                return Err(PoolError::ShutDown);
            }
            state.queue.push_back(job);
        }
        self.total_submitted.fetch_add(1, Ordering::Relaxed);
        self.condvar.notify_one();
        Ok(())
    }

    /// Blocks until there is a job to run. `None` means the pool is stopped
    /// and the queue has drained.
    fn next_job(&self) -> Option<Job> {
        let mut state = self
            .condvar
            .wait_while(self.lock(), |state| !state.stop && state.queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let job = state.queue.pop_front()?;
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }

    fn worker_exited(&self) {
        let id = thread::current().id();
        {
            let mut state = self.lock();
            state.live_workers -= 1;
            state.stopping_workers.retain(|worker| *worker != id);
        }
        self.exited.notify_all();
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    trace!(worker = index, "worker started");
    while let Some(job) = shared.next_job() {
        job();
        shared.active_tasks.fetch_sub(1, Ordering::Relaxed);
        shared.completed_tasks.fetch_add(1, Ordering::Relaxed);
    }
    shared.worker_exited();
    trace!(worker = index, "worker exiting");
}


/// Fixed-size pool of worker threads sharing one FIFO task queue.
///
/// Tasks are started in submission order by whichever worker is idle; they
/// may finish in any order. Dropping the pool behaves like
/// [`shutdown`](Self::shutdown): tasks already queued still run before the
/// workers exit.
///
/// A pool with zero workers is allowed. It accepts tasks but never runs them,
/// and their handles report [`SpawnError::Abandoned`](crate::errors::SpawnError::Abandoned)
/// once the pool is torn down.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    num_threads: usize,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    /// Spawns `config.num_threads` workers.
    ///
    /// If a worker fails to spawn, the ones already running are stopped and
    /// joined before the error is returned.
    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        let pool = ThreadPool {
            shared: Arc::new(Shared::new()),
            workers: Mutex::new(Vec::with_capacity(config.num_threads)),
            num_threads: config.num_threads,
        };

        if config.num_threads == 0 {
            warn!("thread pool created with zero workers, submitted tasks will never run");
        }

        let prefix = config.thread_name.as_deref().unwrap_or(DEFAULT_THREAD_NAME);
        if config.num_threads > 0 && prefix.contains('\0') {
            return Err(PoolError::SpawnWorker {
                index: 0,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "thread name must not contain null bytes",
                ),
            });
        }

        for index in 0..config.num_threads {
            let mut builder = thread::Builder::new().name(format!("{prefix}-{index}"));
            if let Some(size) = config.stack_size {
                builder = builder.stack_size(size);
            }

            let shared = pool.shared.clone();
            let worker = builder
                .spawn(move || worker_loop(&shared, index))
                .map_err(|source| PoolError::SpawnWorker { index, source })?;
            {
                let mut state = pool.shared.lock();
                state.worker_ids.push(worker.thread().id());
                state.live_workers += 1;
            }
            pool.lock_workers().push(worker);
        }

        debug!(workers = config.num_threads, name = prefix, "thread pool started");
        Ok(pool)
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().stop
    }

    /// Submits `f` and returns a handle to its result.
    ///
    /// A panic inside `f` is caught and surfaces only through the returned
    /// handle. Fails with [`PoolError::ShutDown`] once teardown has begun.
    pub fn enqueue<F, T>(&self, f: F) -> Result<JoinHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (promise, handle) = handle::pair();
        let panicked_tasks = self.shared.panicked_tasks.clone();

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(f));
            if outcome.is_err() {
                panicked_tasks.fetch_add(1, Ordering::Relaxed);
            }
            promise.complete(outcome);
        });

        self.shared.push(job)?;
        Ok(handle)
    }

    /// Submits `f` together with its arguments, which are moved into the task
    /// now rather than when it runs. Pass a tuple for several arguments.
    #[inline]
    pub fn enqueue_with<F, A, T>(&self, f: F, args: A) -> Result<JoinHandle<T>, PoolError>
    where
        F: FnOnce(A) -> T + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move || f(args))
    }

    pub fn metrics(&self) -> PoolMetrics {
        let queued_tasks = self.shared.lock().queue.len();
        PoolMetrics {
            workers: self.num_threads,
            queued_tasks,
            active_tasks: self.shared.active_tasks.load(Ordering::Relaxed),
            total_submitted: self.shared.total_submitted.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            panicked_tasks: self.shared.panicked_tasks.load(Ordering::Relaxed),
        }
    }

    /// Stops accepting tasks, lets the workers drain the queue and waits
    /// until every worker has exited.
    ///
    /// Safe to call more than once and from several threads; each caller
    /// returns only after the workers are gone. Called from one of the pool's
    /// own tasks, it waits for the other workers and leaves the calling one to
    /// finish its task and drain on its own.
    pub fn shutdown(&self) {
        let current = thread::current().id();
        let orphaned = {
            let mut state = self.shared.lock();
            if !state.stop {
                state.stop = true;
                debug!(queued = state.queue.len(), "thread pool shutting down");
            }
            let on_worker = state.worker_ids.contains(&current);
            if on_worker && !state.stopping_workers.contains(&current) {
                warn!("thread pool shut down from its own worker");
                state.stopping_workers.push(current);
                self.shared.exited.notify_all();
            }
            self.shared.condvar.notify_all();

            let mut state = self
                .shared
                .exited
                .wait_while(state, |state| {
                    // a worker caller only waits for the workers not blocked in here
                    let exempt = if on_worker { state.stopping_workers.len() } else { 0 };
                    state.live_workers > exempt
                })
                .unwrap_or_else(PoisonError::into_inner);

            // jobs only outlive the workers when there were none to begin with
            if state.live_workers == 0 {
                mem::take(&mut state.queue)
            } else {
                VecDeque::new()
            }
        };

        if !orphaned.is_empty() {
            warn!(count = orphaned.len(), "discarding tasks that never ran");
        }
        drop(orphaned);

        let workers = mem::take(&mut *self.lock_workers());
        for worker in workers {
            // a worker cannot join itself, it exits once its task returns
            if worker.thread().id() == current {
                continue;
            }
            if let Err(err) = worker.join() {
                error!(?err, "worker thread failed to join");
            }
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<thread::JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads)
            .field("is_shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn queue_is_untouched_after_shutdown() {
        let pool = ThreadPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(matches!(pool.enqueue(|| 1), Err(PoolError::ShutDown)));
        assert!(pool.shared.lock().queue.is_empty());
        assert_eq!(pool.metrics().total_submitted, 0);
    }

    #[test]
    fn zero_workers_leave_tasks_queued() {
        let pool = ThreadPool::new(0).unwrap();
        let handle = pool.enqueue(|| 1).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.shared.lock().queue.len(), 1);
        assert!(!handle.is_finished());
        pool.shutdown();
        assert!(pool.shared.lock().queue.is_empty());
        assert_eq!(handle.join(), Err(crate::errors::SpawnError::Abandoned));
    }

    #[test]
    fn workers_are_named_after_config() {
        let pool = ThreadPool::with_config(Config::default().with_threads(1).with_thread_name("named")).unwrap();
        let name = pool
            .enqueue(|| thread::current().name().map(str::to_owned))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("named-0"));
    }

    #[test]
    fn null_byte_in_thread_name_is_rejected() {
        let config = Config::default().with_threads(1).with_thread_name("bad\0name");
        match ThreadPool::with_config(config) {
            Err(PoolError::SpawnWorker { index, source }) => {
                assert_eq!(index, 0);
                assert_eq!(source.kind(), io::ErrorKind::InvalidInput);
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[test]
    fn null_byte_ignored_without_workers() {
        let config = Config::default().with_threads(0).with_thread_name("bad\0name");
        let pool = ThreadPool::with_config(config).unwrap();
        assert_eq!(pool.num_threads(), 0);
    }

    #[test]
    fn live_workers_reach_zero_after_shutdown() {
        let pool = ThreadPool::new(3).unwrap();
        assert_eq!(pool.shared.lock().live_workers, 3);
        pool.shutdown();
        let state = pool.shared.lock();
        assert_eq!(state.live_workers, 0);
        assert!(state.stopping_workers.is_empty());
    }

    #[test]
    fn presets_size_from_cpu_count() {
        assert_eq!(Config::cpu_bound().num_threads, num_cpus::get());
        assert_eq!(Config::io_bound().num_threads, num_cpus::get() * 2);
        assert_eq!(Config::default().with_stack_size(1 << 20).stack_size, Some(1 << 20));
    }
}
