use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    any::Any,
    fmt,
    future::Future,
    mem,
    panic,
    pin::Pin,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
    thread,
    time::{Duration, Instant},
};
use futures::task::AtomicWaker;


/// Type-erased unit of work as it sits in the pool queue.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

enum Slot<T> {
    Pending,
    Ready(thread::Result<T>),
    Abandoned,
    Taken,
}

impl<T> Slot<T> {
    /// Moves the outcome out, leaving `Taken` behind. `Pending` is left untouched.
    fn take(&mut self) -> Poll<Result<thread::Result<T>, SpawnError>> {
        match mem::replace(self, Slot::Taken) {
            Slot::Pending => {
                *self = Slot::Pending;
                Poll::Pending
            }
            Slot::Ready(outcome) => Poll::Ready(Ok(outcome)),
            Slot::Abandoned => Poll::Ready(Err(SpawnError::Abandoned)),
            Slot::Taken => Poll::Ready(Err(SpawnError::Consumed)),
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }
}

/// Result adapter shared between a queued job and its `JoinHandle`.
struct Packet<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    waker: AtomicWaker,
}

impl<T> Packet<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            ready: Condvar::new(),
            waker: AtomicWaker::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, slot: Slot<T>) {
        *self.lock() = slot;
        self.ready.notify_one();
        self.waker.wake();
    }
}

/// Producer half of the adapter, owned by the queued job.
///
/// Dropping it without calling [`Promise::complete`] marks the task abandoned,
/// so the handle never blocks on a job that can no longer run.
pub(crate) struct Promise<T> {
    packet: Option<Arc<Packet<T>>>,
}

impl<T> Promise<T> {
    pub(crate) fn complete(mut self, outcome: thread::Result<T>) {
        if let Some(packet) = self.packet.take() {
            packet.settle(Slot::Ready(outcome));
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(packet) = self.packet.take() {
            packet.settle(Slot::Abandoned);
        }
    }
}

pub(crate) fn pair<T>() -> (Promise<T>, JoinHandle<T>) {
    let packet = Arc::new(Packet::new());
    let promise = Promise { packet: Some(packet.clone()) };
    (promise, JoinHandle { packet })
}


/// Handle to the eventual result of a task submitted to a `ThreadPool`.
///
/// The blocking retrieval methods consume the handle, so a result can be
/// taken at most once. The handle can also be `.await`ed from async code;
/// polling it again after it resolved yields [`SpawnError::Consumed`].
///
/// Dropping the handle does not cancel the task.
pub struct JoinHandle<T> {
    packet: Arc<Packet<T>>,
}

impl<T> JoinHandle<T> {
    /// Returns `true` once the task has produced a value, panicked, or been
    /// dropped without running.
    #[inline]
    pub fn is_finished(&self) -> bool {
        !self.packet.lock().is_pending()
    }

    /// Blocks the current thread until the task completes.
    ///
    /// A panic inside the task is returned as [`SpawnError::Panic`] carrying
    /// the panic message.
    pub fn join(self) -> SpawnResult<T> {
        self.wait_outcome(None).and_then(into_result)
    }

    /// Like [`join`](Self::join), but gives up after `timeout` with
    /// [`SpawnError::Timeout`].
    pub fn join_timeout(self, timeout: Duration) -> SpawnResult<T> {
        self.wait_outcome(Instant::now().checked_add(timeout))
            .and_then(into_result)
    }

    /// Blocks until the task completes and returns its value.
    ///
    /// # Panics
    ///
    /// Re-raises the task's panic on the calling thread with the original
    /// payload, and panics if the task was dropped without running.
    pub fn wait(self) -> T {
        match self.wait_outcome(None) {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(err) => panic!("{err}"),
        }
    }

    fn wait_outcome(&self, deadline: Option<Instant>) -> Result<thread::Result<T>, SpawnError> {
        let mut slot = self.packet.lock();
        loop {
            if let Poll::Ready(outcome) = slot.take() {
                return outcome;
            }
            slot = match deadline {
                None => self
                    .packet
                    .ready
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SpawnError::Timeout);
                    }
                    self.packet
                        .ready
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.packet.lock();
        // registered under the slot lock so `settle` cannot slip in between
        if slot.is_pending() {
            self.packet.waker.register(cx.waker());
        }
        slot.take().map(|outcome| outcome.and_then(into_result))
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

fn into_result<T>(outcome: thread::Result<T>) -> SpawnResult<T> {
    outcome.map_err(|payload| SpawnError::Panic(panic_message(&*payload)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}
