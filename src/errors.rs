use std::io;

/// Errors raised by the pool itself, as opposed to the tasks it runs.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread {index}: {source}")]
    SpawnWorker {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("enqueue on stopped thread pool")]
    ShutDown,
}

/// Task-level failures, reported only through the task's own handle.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum SpawnError {
    #[error("task panicked: {0}")]
    Panic(String),
    #[error("task was dropped before it ran")]
    Abandoned,
    #[error("timed out waiting for task result")]
    Timeout,
    #[error("task result already taken")]
    Consumed,
}
