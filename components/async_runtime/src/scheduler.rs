//! The scheduler seam.
//!
//! Every promise is confined to one [`Scheduler`]: its producer, its
//! continuations and every change to its state run as tasks on that
//! scheduler's thread. Host run loops integrate by implementing the trait;
//! [`EventLoop`](crate::EventLoop) is the implementation shipped here.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::task_queue::{Task, TaskHandle};

/// A single-threaded run loop that accepts tasks.
///
/// Implementations must run tasks on one logical thread, and tasks posted
/// from one source thread must run in posting order. No method may block the
/// caller.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Enqueues `task` to run on the scheduler's thread.
    fn post(&self, task: Task);

    /// Enqueues `task` to run after at least `delay`.
    fn post_delayed(&self, task: Task, delay: Duration) -> TaskHandle;

    /// Cancels a delayed task that has not run yet. Best-effort.
    fn remove(&self, handle: TaskHandle);

    /// Returns true when called from the scheduler's own thread.
    fn is_current(&self) -> bool;

    /// Runs `task` inline when already on the scheduler's thread, otherwise
    /// posts it.
    fn execute(&self, task: Task) {
        if self.is_current() {
            task.run();
        } else {
            self.post(task);
        }
    }
}

/// Shared, type-erased scheduler handle held by promises.
pub type SharedScheduler = Arc<dyn Scheduler>;

/// Returns true if both handles point at the same scheduler.
pub fn same_scheduler(a: &SharedScheduler, b: &SharedScheduler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
