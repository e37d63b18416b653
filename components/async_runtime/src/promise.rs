//! Promise implementation.
//!
//! A [`Promise`] is a shared handle to a settlement core: a three-state cell
//! holding either the pending continuations or the terminal outcome. Every
//! change to the cell runs on the promise's scheduler; handles may be cloned
//! and sent anywhere.

use std::fmt;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use promise_types::{PromiseError, PromiseResult, PromiseState, Settled};
use tracing::{debug, trace};

use crate::resolution::{self, Resolution};
use crate::resolver::Resolver;
use crate::scheduler::{same_scheduler, SharedScheduler};
use crate::task_queue::Task;

/// A continuation registered on a pending promise.
pub(crate) type Reaction<T> = Box<dyn FnOnce(Settled<T>) + Send>;

enum State<T> {
    Pending(Vec<Reaction<T>>),
    Settled(Settled<T>),
}

struct Core<T> {
    scheduler: SharedScheduler,
    state: Mutex<State<T>>,
    // The promise whose outcome this one takes over, if any.
    source: Mutex<Option<Weak<Core<T>>>>,
}

impl<T> Core<T>
where
    T: Clone + Send + 'static,
{
    // Runs on the owning scheduler. The first call wins.
    fn settle_now(&self, outcome: Settled<T>) {
        let outcome = match outcome {
            Settled::Rejected(error) => Settled::Rejected(error.into_cause()),
            fulfilled => fulfilled,
        };

        let reactions = {
            let mut state = self.state.lock();
            match mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending(reactions) => reactions,
                previous @ State::Settled(_) => {
                    *state = previous;
                    trace!("promise already settled, ignoring");
                    return;
                }
            }
        };

        trace!(state = ?outcome.state(), continuations = reactions.len(), "promise settled");
        for reaction in reactions {
            let outcome = outcome.clone();
            self.scheduler.post(Task::new(move || reaction(outcome)));
        }
    }

    // Runs on the owning scheduler. Never invokes the reaction inline.
    fn add_reaction(&self, reaction: Reaction<T>) {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(reactions) => {
                    reactions.push(reaction);
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        self.scheduler.post(Task::new(move || reaction(outcome)));
    }
}

/// An asynchronous result confined to one scheduler.
///
/// Promises move from [`PromiseState::Pending`] to either
/// [`PromiseState::Fulfilled`] or [`PromiseState::Rejected`] exactly once.
/// Handlers attached with [`then`](Self::then) and its adapters always run as
/// scheduled tasks, never inside the call that attaches them.
///
/// # Examples
///
/// ```
/// use async_runtime::{EventLoop, Promise, Resolution};
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let promise = Promise::new(&scheduler, |resolver| {
///     resolver.resolve(20);
///     Ok(())
/// });
/// let chained = promise.and_then(|v| Ok(Resolution::Value(v + 22)));
///
/// assert_eq!(event_loop.run_until_settled(&chained).unwrap(), 42);
/// ```
pub struct Promise<T> {
    core: Arc<Core<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending promise and runs `producer` on `scheduler`.
    ///
    /// The producer runs inline when called on the scheduler's thread and is
    /// posted otherwise. Returning `Err` is equivalent to calling `reject`,
    /// unless the resolver has already been used.
    pub fn new<F>(scheduler: &SharedScheduler, producer: F) -> Self
    where
        F: FnOnce(Resolver<T>) -> PromiseResult<()> + Send + 'static,
    {
        let promise = Self::pending(scheduler);
        let resolver = Resolver::new(promise.clone());
        scheduler.execute(Task::new(move || {
            let guard = resolver.clone();
            if let Err(error) = producer(resolver) {
                debug!(%error, "producer failed");
                guard.reject(error);
            }
        }));
        promise
    }

    /// Creates a promise that is already fulfilled with `value`.
    pub fn fulfilled(scheduler: &SharedScheduler, value: T) -> Self {
        Self::with_state(scheduler, State::Settled(Settled::Fulfilled(value)))
    }

    /// Creates a promise that is already rejected with `error`.
    pub fn rejected(scheduler: &SharedScheduler, error: PromiseError) -> Self {
        Self::with_state(
            scheduler,
            State::Settled(Settled::Rejected(error.into_cause())),
        )
    }

    /// Coerces `candidate` into a promise on `scheduler`.
    ///
    /// Plain values become fulfilled promises, promises already on
    /// `scheduler` are returned as is, and everything else is flattened.
    pub fn resolve(scheduler: &SharedScheduler, candidate: Resolution<T>) -> Self {
        match candidate {
            Resolution::Value(value) => Self::fulfilled(scheduler, value),
            Resolution::Promise(promise) if same_scheduler(promise.scheduler(), scheduler) => {
                promise
            }
            Resolution::Promise(promise) => promise.observe_on(scheduler),
            thenable => Self::new(scheduler, move |resolver| {
                resolver.resolve_with(thenable);
                Ok(())
            }),
        }
    }

    pub(crate) fn pending(scheduler: &SharedScheduler) -> Self {
        Self::with_state(scheduler, State::Pending(Vec::new()))
    }

    fn with_state(scheduler: &SharedScheduler, state: State<T>) -> Self {
        Self {
            core: Arc::new(Core {
                scheduler: scheduler.clone(),
                state: Mutex::new(state),
                source: Mutex::new(None),
            }),
        }
    }

    /// Returns the scheduler this promise is confined to.
    pub fn scheduler(&self) -> &SharedScheduler {
        &self.core.scheduler
    }

    /// Returns the current state.
    pub fn state(&self) -> PromiseState {
        match &*self.core.state.lock() {
            State::Pending(_) => PromiseState::Pending,
            State::Settled(outcome) => outcome.state(),
        }
    }

    /// Returns true while the promise has not settled.
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Returns the outcome if the promise has settled.
    pub fn outcome(&self) -> Option<Settled<T>> {
        match &*self.core.state.lock() {
            State::Pending(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    /// Returns the value if the promise is fulfilled.
    pub fn value(&self) -> Option<T> {
        match self.outcome()? {
            Settled::Fulfilled(value) => Some(value),
            Settled::Rejected(_) => None,
        }
    }

    /// Returns the error if the promise is rejected.
    pub fn error(&self) -> Option<PromiseError> {
        match self.outcome()? {
            Settled::Fulfilled(_) => None,
            Settled::Rejected(error) => Some(error),
        }
    }

    /// Returns true if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Records that this promise takes its outcome from `source`.
    pub(crate) fn follow(&self, source: &Promise<T>) {
        *self.core.source.lock() = Some(Arc::downgrade(&source.core));
    }

    /// Returns true if this promise is `other`, or only settles once `other`
    /// does through a chain of adoptions and mirrors.
    pub(crate) fn depends_on(&self, other: &Promise<T>) -> bool {
        let mut current = Some(self.core.clone());
        while let Some(core) = current {
            if Arc::ptr_eq(&core, &other.core) {
                return true;
            }
            current = core.source.lock().as_ref().and_then(Weak::upgrade);
        }
        false
    }

    /// Settles the promise. Later calls are ignored.
    pub(crate) fn settle(&self, outcome: Settled<T>) {
        let core = self.core.clone();
        self.core
            .scheduler
            .execute(Task::new(move || core.settle_now(outcome)));
    }

    /// Registers `reaction` to run once the promise settles.
    pub(crate) fn subscribe<F>(&self, reaction: F)
    where
        F: FnOnce(Settled<T>) + Send + 'static,
    {
        let core = self.core.clone();
        self.core
            .scheduler
            .execute(Task::new(move || core.add_reaction(Box::new(reaction))));
    }

    /// Derives a promise from this one's outcome.
    ///
    /// `handler` receives the outcome on the scheduler once this promise
    /// settles. `Ok` resolves the derived promise (flattening async results);
    /// `Err` rejects it with the error's innermost cause.
    pub fn react<U, F>(&self, handler: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Settled<T>) -> PromiseResult<Resolution<U>> + Send + 'static,
    {
        let child = Promise::pending(&self.core.scheduler);
        let target = child.clone();
        self.subscribe(move |outcome| match handler(outcome) {
            Ok(candidate) => resolution::resolve_promise(&target, candidate),
            Err(error) => target.settle(Settled::Rejected(error)),
        });
        child
    }

    /// Attaches a success handler and a failure handler.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> PromiseResult<Resolution<U>> + Send + 'static,
        R: FnOnce(PromiseError) -> PromiseResult<Resolution<U>> + Send + 'static,
    {
        self.react(move |outcome| match outcome {
            Settled::Fulfilled(value) => on_fulfilled(value),
            Settled::Rejected(error) => on_rejected(error),
        })
    }

    /// Attaches a success handler; rejections pass through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> PromiseResult<Resolution<U>> + Send + 'static,
    {
        self.react(move |outcome| match outcome {
            Settled::Fulfilled(value) => on_fulfilled(value),
            Settled::Rejected(error) => Err(error),
        })
    }

    /// Maps the fulfilled value; rejections pass through unchanged.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(move |value| Ok(Resolution::Value(f(value))))
    }

    /// Attaches a failure handler; values pass through unchanged.
    pub fn catch<F>(&self, on_rejected: F) -> Promise<T>
    where
        F: FnOnce(PromiseError) -> PromiseResult<Resolution<T>> + Send + 'static,
    {
        self.react(move |outcome| match outcome {
            Settled::Fulfilled(value) => Ok(Resolution::Value(value)),
            Settled::Rejected(error) => on_rejected(error),
        })
    }

    /// Handles rejections whose cause is an `E`.
    ///
    /// Any other rejection, and every value, passes through unchanged.
    pub fn catch_cause<E, F>(&self, on_rejected: F) -> Promise<T>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&E) -> PromiseResult<Resolution<T>> + Send + 'static,
    {
        self.catch(move |error| match error.cause::<E>() {
            Some(cause) => on_rejected(cause),
            None => Err(error),
        })
    }

    /// Observes whether the promise succeeded; the outcome passes through.
    pub fn finally<F>(&self, on_final: F) -> Promise<T>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.react(move |outcome| {
            on_final(outcome.is_fulfilled());
            match outcome {
                Settled::Fulfilled(value) => Ok(Resolution::Value(value)),
                Settled::Rejected(error) => Err(error),
            }
        })
    }

    /// Callback-style observer; the outcome passes through.
    pub fn done<F>(&self, callback: F) -> Promise<T>
    where
        F: FnOnce(Result<&T, &PromiseError>) + Send + 'static,
    {
        self.react(move |outcome| {
            callback(outcome.as_result());
            match outcome {
                Settled::Fulfilled(value) => Ok(Resolution::Value(value)),
                Settled::Rejected(error) => Err(error),
            }
        })
    }

    /// Returns a fresh promise on the same scheduler that mirrors this one.
    pub fn observe(&self) -> Promise<T> {
        self.observe_on(&self.core.scheduler)
    }

    /// Returns a fresh promise on `scheduler` that mirrors this one.
    pub fn observe_on(&self, scheduler: &SharedScheduler) -> Promise<T> {
        let mirror = Promise::pending(scheduler);
        mirror.follow(self);
        let target = mirror.clone();
        self.subscribe(move |outcome| target.settle(outcome));
        mirror
    }

    /// Mirrors this promise, or rejects with [`PromiseError::Timeout`] if it
    /// has not settled after `delay`.
    pub fn with_timeout(&self, delay: Duration) -> Promise<T> {
        let source = self.clone();
        Promise::new(&self.core.scheduler, move |resolver| {
            let on_timeout = resolver.clone();
            let timer = resolver.post_delayed(
                Task::new(move || on_timeout.reject(PromiseError::Timeout(delay))),
                delay,
            );
            source.subscribe(move |outcome| {
                resolver.settle(outcome);
                if let Some(timer) = timer {
                    resolver.remove(timer);
                }
            });
            Ok(())
        })
    }

    /// Blocks the calling thread until the promise settles.
    ///
    /// Fails with [`PromiseError::Deadlock`] when called on the promise's own
    /// scheduler thread, since nothing could settle it while it waits.
    pub fn wait(&self) -> PromiseResult<T> {
        self.block(None)
    }

    /// Like [`wait`](Self::wait), but gives up with
    /// [`PromiseError::Timeout`] after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> PromiseResult<T> {
        self.block(Some(timeout))
    }

    fn block(&self, timeout: Option<Duration>) -> PromiseResult<T> {
        if self.core.scheduler.is_current() {
            return Err(PromiseError::Deadlock);
        }
        if let Some(outcome) = self.outcome() {
            return outcome.into_result();
        }

        let slot = Arc::new((Mutex::new(None::<Settled<T>>), Condvar::new()));
        let signal = slot.clone();
        self.subscribe(move |outcome| {
            let (lock, ready) = &*signal;
            *lock.lock() = Some(outcome);
            ready.notify_all();
        });

        let deadline = timeout.and_then(|t| Instant::now().checked_add(t).map(|at| (at, t)));
        let (lock, ready) = &*slot;
        let mut guard = lock.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome.into_result();
            }
            match deadline {
                Some((at, timeout)) => {
                    if ready.wait_until(&mut guard, at).timed_out() && guard.is_none() {
                        return Err(PromiseError::Timeout(timeout));
                    }
                }
                None => ready.wait(&mut guard),
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.core.state.lock() {
            State::Pending(reactions) => format!("Pending({} continuations)", reactions.len()),
            State::Settled(Settled::Fulfilled(_)) => "Fulfilled".to_string(),
            State::Settled(Settled::Rejected(error)) => format!("Rejected({error})"),
        };
        f.debug_struct("Promise").field("state", &state).finish()
    }
}
