//! The exactly-once settlement capability.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use promise_types::{PromiseError, Settled};
use tracing::trace;

use crate::promise::Promise;
use crate::resolution::{self, Resolution};
use crate::scheduler::SharedScheduler;
use crate::task_queue::{Task, TaskHandle};

/// Settles one promise, at most once.
///
/// Handed to producers, thenables and [`series`](crate::series) steps. Clones
/// share the same once-flag: the first `resolve`, `resolve_with`, `reject` or
/// `settle` on any clone takes effect and every later call is ignored. A
/// resolver may be used from any thread; the settlement itself always happens
/// on the promise's scheduler.
///
/// The scheduling helpers ([`post`](Self::post),
/// [`post_delayed`](Self::post_delayed), [`remove`](Self::remove)) forward to
/// the promise's scheduler so producers can arrange follow-up work without
/// holding a scheduler of their own.
pub struct Resolver<T> {
    target: Promise<T>,
    settled: Arc<AtomicBool>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            settled: self.settled.clone(),
        }
    }
}

impl<T> Resolver<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(target: Promise<T>) -> Self {
        Self {
            target,
            settled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fulfills the promise with `value`.
    pub fn resolve(&self, value: T) {
        self.resolve_with(Resolution::Value(value));
    }

    /// Resolves the promise with a candidate, adopting it if it is
    /// asynchronous.
    pub fn resolve_with(&self, candidate: Resolution<T>) {
        if self.claim() {
            resolution::resolve_promise(&self.target, candidate);
        }
    }

    /// Rejects the promise with `error`.
    pub fn reject(&self, error: PromiseError) {
        if self.claim() {
            self.target.settle(Settled::Rejected(error));
        }
    }

    /// Settles the promise with an already known outcome.
    pub fn settle(&self, outcome: Settled<T>) {
        if self.claim() {
            self.target.settle(outcome);
        }
    }

    /// Returns true once any clone of this resolver has been used.
    pub fn is_done(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Posts `task` to the promise's scheduler unless already done.
    pub fn post(&self, task: Task) {
        if !self.is_done() {
            self.target.scheduler().post(task);
        }
    }

    /// Posts `task` to run after `delay` unless already done.
    ///
    /// # Returns
    ///
    /// A handle for [`remove`](Self::remove), or `None` when nothing was
    /// posted.
    pub fn post_delayed(&self, task: Task, delay: Duration) -> Option<TaskHandle> {
        if self.is_done() {
            return None;
        }
        Some(self.target.scheduler().post_delayed(task, delay))
    }

    /// Cancels a delayed task posted through this resolver.
    pub fn remove(&self, handle: TaskHandle) {
        self.target.scheduler().remove(handle);
    }

    /// Returns the scheduler of the promise being settled.
    pub fn scheduler(&self) -> &SharedScheduler {
        self.target.scheduler()
    }

    pub(crate) fn target(&self) -> &Promise<T> {
        &self.target
    }

    fn claim(&self) -> bool {
        let first = self
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !first {
            trace!("resolver already used, ignoring");
        }
        first
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("done", &self.settled.load(Ordering::Acquire))
            .field("target", &self.target)
            .finish()
    }
}
