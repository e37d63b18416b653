//! Combinators over collections of candidates.
//!
//! Each combinator returns a fresh promise on the given scheduler. Items are
//! [`Resolution`]s, so plain values and asynchronous values can be mixed;
//! asynchronous items are coerced with [`Promise::resolve`] before being
//! observed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use promise_types::{PromiseError, PromiseResult, Settled};

use crate::promise::Promise;
use crate::resolution::Resolution;
use crate::resolver::Resolver;
use crate::scheduler::SharedScheduler;
use crate::task_queue::Task;

struct Collected<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

fn record<T>(collected: &Mutex<Collected<T>>, resolver: &Resolver<Vec<T>>, index: usize, value: T)
where
    T: Clone + Send + 'static,
{
    let values = {
        let mut collected = collected.lock();
        collected.slots[index] = Some(value);
        collected.remaining -= 1;
        if collected.remaining > 0 {
            return;
        }
        collected.slots.drain(..).collect::<Option<Vec<T>>>()
    };
    if let Some(values) = values {
        resolver.resolve(values);
    }
}

/// Waits for every item and fulfills with their values in input order.
///
/// Rejects with the first rejection observed; later outcomes are ignored.
/// An empty input fulfills immediately with an empty vector.
///
/// # Examples
///
/// ```
/// use async_runtime::{all, EventLoop, Promise, Resolution};
///
/// let mut event_loop = EventLoop::new();
/// let scheduler = event_loop.scheduler();
///
/// let later = Promise::fulfilled(&scheduler, 2).map(|v| v * 10);
/// let items: Vec<Resolution<i32>> = vec![Resolution::Value(1), later.into()];
/// let combined = all(&scheduler, items);
/// assert_eq!(event_loop.run_until_settled(&combined).unwrap(), vec![1, 20]);
/// ```
pub fn all<T, I>(scheduler: &SharedScheduler, items: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Resolution<T>>,
{
    let items: Vec<Resolution<T>> = items.into_iter().collect();
    Promise::new(scheduler, move |resolver| {
        if items.is_empty() {
            resolver.resolve(Vec::new());
            return Ok(());
        }

        let collected = Arc::new(Mutex::new(Collected {
            slots: vec![None; items.len()],
            remaining: items.len(),
        }));
        for (index, item) in items.into_iter().enumerate() {
            match item {
                Resolution::Value(value) => record(&collected, &resolver, index, value),
                candidate => {
                    let collected = collected.clone();
                    let resolver = resolver.clone();
                    Promise::resolve(resolver.scheduler(), candidate).subscribe(
                        move |outcome| match outcome {
                            Settled::Fulfilled(value) => {
                                record(&collected, &resolver, index, value)
                            }
                            Settled::Rejected(error) => resolver.reject(error),
                        },
                    );
                }
            }
        }
        Ok(())
    })
}

/// Settles like the first item to settle.
///
/// A plain value counts as already settled, so the first plain value in
/// iteration order wins over every asynchronous item. An empty input never
/// settles.
pub fn race<T, I>(scheduler: &SharedScheduler, items: I) -> Promise<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Resolution<T>>,
{
    let items: Vec<Resolution<T>> = items.into_iter().collect();
    Promise::new(scheduler, move |resolver| {
        for item in items {
            match item {
                Resolution::Value(value) => resolver.resolve(value),
                candidate => {
                    let resolver = resolver.clone();
                    Promise::resolve(resolver.scheduler(), candidate)
                        .subscribe(move |outcome| resolver.settle(outcome));
                }
            }
        }
        Ok(())
    })
}

/// Runs producers one after another and fulfills with all their values.
///
/// Each producer starts only after the previous one fulfilled. The first
/// rejection rejects the result and no later producer runs. An empty input
/// fulfills with an empty vector.
pub fn series<T, I, F>(scheduler: &SharedScheduler, producers: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = F>,
    F: FnOnce(Resolver<T>) -> PromiseResult<()> + Send + 'static,
{
    let producers: VecDeque<F> = producers.into_iter().collect();
    let capacity = producers.len();
    let owner = scheduler.clone();
    Promise::new(scheduler, move |resolver| {
        run_next(owner, producers, Vec::with_capacity(capacity), resolver);
        Ok(())
    })
}

fn run_next<T, F>(
    scheduler: SharedScheduler,
    mut producers: VecDeque<F>,
    mut values: Vec<T>,
    resolver: Resolver<Vec<T>>,
) where
    T: Clone + Send + 'static,
    F: FnOnce(Resolver<T>) -> PromiseResult<()> + Send + 'static,
{
    let Some(producer) = producers.pop_front() else {
        resolver.resolve(values);
        return;
    };
    Promise::new(&scheduler, producer).subscribe(move |outcome| match outcome {
        Settled::Fulfilled(value) => {
            values.push(value);
            run_next(scheduler, producers, values, resolver);
        }
        Settled::Rejected(error) => resolver.reject(error),
    });
}

/// Settles after `delay`: fulfilled with `()` when `error` is `None`,
/// rejected with `error` otherwise.
///
/// The delay is a lower bound; the promise settles on the first loop turn
/// after it elapses.
pub fn timeout(
    scheduler: &SharedScheduler,
    delay: Duration,
    error: Option<PromiseError>,
) -> Promise<()> {
    Promise::new(scheduler, move |resolver| {
        let fire = resolver.clone();
        resolver.post_delayed(
            Task::new(move || match error {
                Some(error) => fire.reject(error),
                None => fire.resolve(()),
            }),
            delay,
        );
        Ok(())
    })
}
