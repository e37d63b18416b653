//! Resolution of candidate results.
//!
//! A candidate is either a plain value or something asynchronous. The
//! distinction is made once, by the [`Resolution`] type, and
//! [`resolve_promise`] flattens asynchronous candidates until a plain value or
//! an error settles the target.

use std::fmt;

use promise_types::{PromiseError, PromiseResult, Settled};

use crate::promise::Promise;
use crate::resolver::Resolver;
use crate::task_queue::Task;

/// Something that can settle a promise later.
///
/// `settle_into` hooks the given resolver up to the thenable's eventual
/// result. Calling the resolver more than once, or returning `Err` after
/// calling it, has no further effect.
///
/// Closures taking a [`Resolver`] are thenables:
///
/// ```
/// use async_runtime::{EventLoop, Promise, Resolution, Resolver};
///
/// let mut event_loop = EventLoop::new();
/// let thenable = Resolution::thenable(|resolver: Resolver<u8>| {
///     resolver.resolve(3);
///     Ok(())
/// });
/// let promise = Promise::resolve(&event_loop.scheduler(), thenable);
/// assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 3);
/// ```
pub trait Thenable<T>: Send {
    /// Arranges for `resolver` to receive this thenable's result.
    fn settle_into(self: Box<Self>, resolver: Resolver<T>) -> PromiseResult<()>;
}

impl<T, F> Thenable<T> for F
where
    F: FnOnce(Resolver<T>) -> PromiseResult<()> + Send,
{
    fn settle_into(self: Box<Self>, resolver: Resolver<T>) -> PromiseResult<()> {
        (*self)(resolver)
    }
}

/// A candidate result for settling a promise.
pub enum Resolution<T> {
    /// An immediate value
    Value(T),
    /// A promise whose outcome is adopted
    Promise(Promise<T>),
    /// A foreign asynchronous value exposing a settlement hook
    Thenable(Box<dyn Thenable<T>>),
}

impl<T> Resolution<T> {
    /// Wraps a thenable.
    pub fn thenable<H>(thenable: H) -> Self
    where
        H: Thenable<T> + 'static,
    {
        Resolution::Thenable(Box::new(thenable))
    }

    /// Returns true unless this is an immediate value.
    pub fn is_async(&self) -> bool {
        !matches!(self, Resolution::Value(_))
    }
}

impl<T> From<Promise<T>> for Resolution<T> {
    fn from(promise: Promise<T>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(_) => f.write_str("Value(..)"),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Settles `target` with `candidate`, flattening asynchronous candidates.
///
/// Runs on the target's scheduler.
pub(crate) fn resolve_promise<T>(target: &Promise<T>, candidate: Resolution<T>)
where
    T: Clone + Send + 'static,
{
    let target = target.clone();
    let scheduler = target.scheduler().clone();
    scheduler.execute(Task::new(move || resolve_now(&target, candidate)));
}

fn resolve_now<T>(target: &Promise<T>, candidate: Resolution<T>)
where
    T: Clone + Send + 'static,
{
    match candidate {
        Resolution::Value(value) => target.settle(Settled::Fulfilled(value)),
        Resolution::Promise(inner) if inner.depends_on(target) => {
            target.settle(Settled::Rejected(PromiseError::SelfResolution));
        }
        // Already flat: its outcome never holds another async value.
        Resolution::Promise(inner) => {
            target.follow(&inner);
            let target = target.clone();
            inner.subscribe(move |outcome| target.settle(outcome));
        }
        Resolution::Thenable(thenable) => {
            let resolver = Resolver::new(target.clone());
            let guard = resolver.clone();
            if let Err(error) = thenable.settle_into(resolver) {
                guard.reject(error);
            }
        }
    }
}
