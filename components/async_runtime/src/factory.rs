//! Re-invocable producers.

use std::fmt;
use std::sync::Arc;

use promise_types::PromiseResult;
use tracing::debug;

use crate::deferred::Deferred;
use crate::promise::Promise;
use crate::resolver::Resolver;
use crate::scheduler::SharedScheduler;

type Producer<T> = dyn Fn(Resolver<T>) -> PromiseResult<()> + Send + Sync;

/// A producer that can start the same asynchronous operation many times.
///
/// Every [`make`](Self::make) runs the producer against a fresh promise, so a
/// caller that needs to retry an operation keeps the factory instead of a
/// promise. Clones share the producer.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, PromiseFactory};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let mut event_loop = EventLoop::new();
/// let attempts = Arc::new(AtomicUsize::new(0));
/// let counter = attempts.clone();
/// let factory = PromiseFactory::new(move |resolver| {
///     resolver.resolve(counter.fetch_add(1, Ordering::SeqCst) + 1);
///     Ok(())
/// });
///
/// let first = factory.make(&event_loop.scheduler());
/// let second = factory.make(&event_loop.scheduler());
/// assert_eq!(event_loop.run_until_settled(&first).unwrap(), 1);
/// assert_eq!(event_loop.run_until_settled(&second).unwrap(), 2);
/// ```
pub struct PromiseFactory<T> {
    producer: Arc<Producer<T>>,
}

impl<T> Clone for PromiseFactory<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T> PromiseFactory<T>
where
    T: Clone + Send + 'static,
{
    /// Wraps `producer`.
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(Resolver<T>) -> PromiseResult<()> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Starts the operation on a new promise confined to `scheduler`.
    pub fn make(&self, scheduler: &SharedScheduler) -> Promise<T> {
        let producer = self.producer.clone();
        Promise::new(scheduler, move |resolver| producer(resolver))
    }

    /// Starts the operation against an existing deferred.
    ///
    /// The producer runs on the calling thread, and only if `deferred` has
    /// not been settled yet. A producer error rejects the deferred.
    ///
    /// # Returns
    ///
    /// A new promise observing `deferred`.
    pub fn make_into(&self, deferred: &Deferred<T>) -> Promise<T> {
        if !deferred.is_done() {
            if let Err(error) = (self.producer)(deferred.resolver()) {
                debug!(%error, "producer failed");
                deferred.reject(error);
            }
        }
        deferred.spawn()
    }
}

impl<T> fmt::Debug for PromiseFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromiseFactory {{ ... }}")
    }
}
