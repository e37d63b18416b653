//! Unit tests for thenable flattening

use std::thread;

use async_runtime::{
    ErrorKind, EventLoop, Promise, PromiseError, PromiseResult, Resolution, Resolver, Thenable,
};

use crate::support::delayed;

/// A thenable that settles from a worker thread.
struct Background(u32);

impl Thenable<u32> for Background {
    fn settle_into(self: Box<Self>, resolver: Resolver<u32>) -> PromiseResult<()> {
        let value = self.0;
        thread::spawn(move || resolver.resolve(value));
        Ok(())
    }
}

/// A thenable that breaks its contract.
struct Broken;

impl Thenable<u32> for Broken {
    fn settle_into(self: Box<Self>, _resolver: Resolver<u32>) -> PromiseResult<()> {
        Err(PromiseError::Thenable("no settlement hook".to_string()))
    }
}

#[test]
fn plain_value_is_not_async() {
    assert!(!Resolution::Value(1).is_async());
}

#[test]
fn promise_and_thenable_are_async() {
    let event_loop = EventLoop::new();
    let promise = Promise::fulfilled(&event_loop.scheduler(), 1);
    assert!(Resolution::from(promise).is_async());
    assert!(Resolution::thenable(Broken).is_async());
}

#[test]
fn struct_thenable_settles_from_other_thread() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::resolve(&event_loop.scheduler(), Resolution::thenable(Background(8)));
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 8);
}

#[test]
fn thenable_error_rejects() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::resolve(&event_loop.scheduler(), Resolution::thenable(Broken));
    let error = event_loop.run_until_settled(&promise).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Resolution);
}

#[test]
fn thenable_calling_resolver_twice_keeps_first() {
    let mut event_loop = EventLoop::new();
    let thenable = Resolution::thenable(|resolver: Resolver<&'static str>| {
        resolver.resolve("first");
        resolver.reject(PromiseError::rejected("second"));
        resolver.resolve("third");
        Ok(())
    });
    let promise = Promise::resolve(&event_loop.scheduler(), thenable);
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), "first");
}

#[test]
fn thenable_resolving_with_promise_flattens() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let inner = delayed(&scheduler, 2, 5u32);
    let thenable = Resolution::thenable(move |resolver: Resolver<u32>| {
        resolver.resolve_with(inner.into());
        Ok(())
    });
    let promise = Promise::resolve(&scheduler, thenable);
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 5);
}

#[test]
fn resolve_returns_same_promise_on_same_scheduler() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let promise = Promise::fulfilled(&scheduler, 1);
    let coerced = Promise::resolve(&scheduler, promise.clone().into());
    assert!(coerced.ptr_eq(&promise));
}

#[test]
fn resolve_rehomes_promise_from_other_scheduler() {
    let mut event_loop = EventLoop::new();
    let mut other = EventLoop::new();
    let foreign = Promise::fulfilled(&other.scheduler(), 3);

    let local = Promise::resolve(&event_loop.scheduler(), foreign.clone().into());
    assert!(!local.ptr_eq(&foreign));
    // The continuation is queued on the loop that owns `foreign`.
    other.run_until_idle();
    assert_eq!(event_loop.run_until_settled(&local).unwrap(), 3);
}
