//! Fixed-size thread pool with a shared FIFO task queue
//!
//! # Features
//! - Fixed set of OS worker threads, spawned once and joined on teardown
//! - Tasks of any return type, results delivered through a `JoinHandle`
//! - Blocking, bounded-wait and `async` retrieval of results
//! - Panics captured per task and reported only through that task's handle
//! - Graceful shutdown: queued tasks drain before the workers exit

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use errors::{PoolError, SpawnError};
pub use handle::JoinHandle;
pub use pool::{Config, ThreadPool};
