//! Externally settled promises.

use std::fmt;
use std::time::Duration;

use promise_types::{PromiseError, Settled};

use crate::promise::Promise;
use crate::resolution::Resolution;
use crate::resolver::Resolver;
use crate::scheduler::SharedScheduler;
use crate::task_queue::{Task, TaskHandle};

/// A promise paired with the right to settle it.
///
/// Useful when the code that finishes the work is not the code that starts
/// it, for example a callback registered with some other subsystem. The
/// settle operations may be called from any thread and only the first one
/// takes effect.
///
/// # Examples
///
/// ```
/// use async_runtime::{Deferred, EventLoop};
/// use std::thread;
///
/// let mut event_loop = EventLoop::new();
/// let deferred = Deferred::new(&event_loop.scheduler());
/// let observer = deferred.spawn();
///
/// let remote = deferred.clone();
/// thread::spawn(move || remote.resolve("done")).join().unwrap();
///
/// assert_eq!(event_loop.run_until_settled(&observer).unwrap(), "done");
/// ```
pub struct Deferred<T> {
    resolver: Resolver<T>,
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending deferred confined to `scheduler`.
    pub fn new(scheduler: &SharedScheduler) -> Self {
        Self {
            resolver: Resolver::new(Promise::pending(scheduler)),
        }
    }

    /// Fulfills with `value`.
    pub fn resolve(&self, value: T) {
        self.resolver.resolve(value);
    }

    /// Resolves with a candidate, adopting it if it is asynchronous.
    pub fn resolve_with(&self, candidate: Resolution<T>) {
        self.resolver.resolve_with(candidate);
    }

    /// Rejects with `error`.
    pub fn reject(&self, error: PromiseError) {
        self.resolver.reject(error);
    }

    /// Settles with an already known outcome.
    pub fn settle(&self, outcome: Settled<T>) {
        self.resolver.settle(outcome);
    }

    /// Returns true once a settle operation has been accepted.
    pub fn is_done(&self) -> bool {
        self.resolver.is_done()
    }

    /// Posts `task` to the owning scheduler unless already done.
    pub fn post(&self, task: Task) {
        self.resolver.post(task);
    }

    /// Posts `task` to run after `delay` unless already done.
    pub fn post_delayed(&self, task: Task, delay: Duration) -> Option<TaskHandle> {
        self.resolver.post_delayed(task, delay)
    }

    /// Cancels a delayed task.
    pub fn remove(&self, handle: TaskHandle) {
        self.resolver.remove(handle);
    }

    /// Returns the owning scheduler.
    pub fn scheduler(&self) -> &SharedScheduler {
        self.resolver.scheduler()
    }

    /// Returns the settlement capability, sharing this deferred's once-flag.
    pub fn resolver(&self) -> Resolver<T> {
        self.resolver.clone()
    }

    /// Returns a new promise that settles the same way as this deferred.
    ///
    /// Each call yields an independent promise; attaching handlers to one
    /// does not affect the others.
    pub fn spawn(&self) -> Promise<T> {
        self.resolver.target().observe()
    }
}
