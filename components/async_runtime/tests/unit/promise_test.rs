//! Unit tests for Promise

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_runtime::{
    ErrorKind, EventLoop, Promise, PromiseError, PromiseResult, PromiseState, Resolution, Resolver,
    Settled,
};

use crate::support::{delayed, log};

#[derive(Debug)]
struct NotFound(&'static str);

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found", self.0)
    }
}

impl std::error::Error for NotFound {}

#[test]
fn new_promise_settles_from_producer() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::new(&event_loop.scheduler(), |resolver| {
        resolver.resolve(42);
        Ok(())
    });
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 42);
}

#[test]
fn producer_error_rejects() {
    let mut event_loop = EventLoop::new();
    let promise: Promise<u8> = Promise::new(&event_loop.scheduler(), |_resolver| {
        Err(PromiseError::producer("no input"))
    });
    let error = event_loop.run_until_settled(&promise).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Producer);
}

#[test]
fn producer_error_keeps_its_own_kind() {
    let mut event_loop = EventLoop::new();
    let promise: Promise<u8> = Promise::new(&event_loop.scheduler(), |_resolver| {
        Err(PromiseError::rejected("plain"))
    });
    let error = event_loop.run_until_settled(&promise).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Rejected);
    assert_eq!(error.to_string(), "plain");
}

#[test]
fn producer_error_after_resolve_is_ignored() {
    let mut event_loop = EventLoop::new();
    let promise = Promise::new(&event_loop.scheduler(), |resolver| {
        resolver.resolve(1);
        Err(PromiseError::producer("too late"))
    });
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 1);
}

#[test]
fn producer_posted_when_created_off_thread() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let promise = thread::spawn(move || {
        Promise::new(&scheduler, |resolver| {
            resolver.resolve("from loop");
            Ok(())
        })
    })
    .join()
    .unwrap();

    assert!(promise.is_pending());
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), "from loop");
}

#[test]
fn nested_async_values_flatten() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let c = Resolution::thenable(|resolver: Resolver<i32>| {
        resolver.resolve(42);
        Ok(())
    });
    let b = Promise::resolve(&scheduler, c);
    let a = Promise::new(&scheduler, move |resolver| {
        resolver.resolve_with(b.into());
        Ok(())
    });

    assert_eq!(event_loop.run_until_settled(&a).unwrap(), 42);
}

#[test]
fn handler_returning_self_rejects() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let source = Promise::fulfilled(&scheduler, 1);

    let slot: Arc<parking_lot::Mutex<Option<Promise<i32>>>> = Arc::default();
    let own = slot.clone();
    let child = source.and_then(move |_| match own.lock().take() {
        Some(me) => Ok(Resolution::Promise(me)),
        None => Ok(Resolution::Value(0)),
    });
    *slot.lock() = Some(child.clone());

    let error = event_loop.run_until_settled(&child).unwrap_err();
    assert!(matches!(error, PromiseError::SelfResolution));
    assert_eq!(error.kind(), ErrorKind::Resolution);
}

#[test]
fn handler_returning_own_observer_rejects() {
    let mut event_loop = EventLoop::new();
    let source = Promise::fulfilled(&event_loop.scheduler(), 1);

    let slot: Arc<parking_lot::Mutex<Option<Promise<i32>>>> = Arc::default();
    let own = slot.clone();
    let child = source.and_then(move |v| match own.lock().take() {
        Some(me) => Ok(Resolution::Promise(me.observe())),
        None => Ok(Resolution::Value(v)),
    });
    *slot.lock() = Some(child.clone());

    let error = event_loop.run_until_settled(&child).unwrap_err();
    assert!(matches!(error, PromiseError::SelfResolution));
}

#[test]
fn then_routes_to_matching_handler() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let ok = Promise::fulfilled(&scheduler, 2).then(
        |v| Ok(Resolution::Value(format!("value {v}"))),
        |e| Ok(Resolution::Value(format!("error {e}"))),
    );
    let failed = Promise::<i32>::rejected(&scheduler, PromiseError::rejected("bad")).then(
        |v| Ok(Resolution::Value(format!("value {v}"))),
        |e| Ok(Resolution::Value(format!("error {e}"))),
    );

    assert_eq!(event_loop.run_until_settled(&ok).unwrap(), "value 2");
    assert_eq!(event_loop.run_until_settled(&failed).unwrap(), "error bad");
}

#[test]
fn handler_error_rejects_child() {
    let mut event_loop = EventLoop::new();
    let child = Promise::fulfilled(&event_loop.scheduler(), 1).and_then(
        |_| -> PromiseResult<Resolution<i32>> { Err(PromiseError::handler("broken step")) },
    );

    let error = event_loop.run_until_settled(&child).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Handler);
    assert_eq!(error.to_string(), "handler failed: broken step");
}

#[test]
fn rejection_skips_success_handlers() {
    let mut event_loop = EventLoop::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let recovered = Promise::<i32>::rejected(&event_loop.scheduler(), PromiseError::rejected("x"))
        .map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v
        })
        .catch(|error| Ok(Resolution::Value(error.to_string().len() as i32)));

    assert_eq!(event_loop.run_until_settled(&recovered).unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn catch_cause_matches_only_its_type() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let matched = Promise::<String>::rejected(&scheduler, PromiseError::rejected(NotFound("key")))
        .catch_cause(|cause: &NotFound| Ok(Resolution::Value(cause.0.to_string())));
    assert_eq!(event_loop.run_until_settled(&matched).unwrap(), "key");

    let passed = Promise::<String>::rejected(&scheduler, PromiseError::rejected("other"))
        .catch_cause(|cause: &NotFound| Ok(Resolution::Value(cause.0.to_string())));
    let error = event_loop.run_until_settled(&passed).unwrap_err();
    assert_eq!(error.to_string(), "other");
}

#[test]
fn catch_cause_sees_through_wrapper() {
    let mut event_loop = EventLoop::new();
    let wrapped = PromiseError::wrap_error(NotFound("file"));
    let recovered = Promise::<u8>::rejected(&event_loop.scheduler(), wrapped)
        .catch_cause(|_: &NotFound| Ok(Resolution::Value(0)));
    assert_eq!(event_loop.run_until_settled(&recovered).unwrap(), 0);
}

#[test]
fn wrapped_rejection_is_stored_unwrapped() {
    let mut event_loop = EventLoop::new();
    let promise: Promise<u8> = Promise::new(&event_loop.scheduler(), |resolver| {
        resolver.reject(PromiseError::rejected("inner").wrap().wrap());
        Ok(())
    });
    let error = event_loop.run_until_settled(&promise).unwrap_err();
    assert!(!error.is_wrapped());
    assert_eq!(error.kind(), ErrorKind::Rejected);
}

#[test]
fn finally_reports_success_and_passes_outcome() {
    let mut event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let flags = log();

    let record = flags.clone();
    let ok = Promise::fulfilled(&scheduler, 5).finally(move |success| record.lock().push(success));
    let record = flags.clone();
    let failed = Promise::<i32>::rejected(&scheduler, PromiseError::rejected("no"))
        .finally(move |success| record.lock().push(success));

    assert_eq!(event_loop.run_until_settled(&ok).unwrap(), 5);
    assert!(event_loop.run_until_settled(&failed).is_err());
    assert_eq!(*flags.lock(), vec![true, false]);
}

#[test]
fn done_sees_outcome_by_reference() {
    let mut event_loop = EventLoop::new();
    let seen = log();
    let record = seen.clone();
    let promise = Promise::fulfilled(&event_loop.scheduler(), 7).done(move |result| {
        record.lock().push(result.map(|v| *v).map_err(|e| e.to_string()));
    });
    assert_eq!(event_loop.run_until_settled(&promise).unwrap(), 7);
    assert_eq!(*seen.lock(), vec![Ok(7)]);
}

#[test]
fn continuations_run_in_registration_order() {
    let mut event_loop = EventLoop::new();
    let source: Promise<i32> = delayed(&event_loop.scheduler(), 1, 0);
    let order = log();

    for n in 0..5 {
        let order = order.clone();
        source.map(move |_| order.lock().push(n));
    }
    event_loop.run_until_idle();
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn observe_fans_out_to_independent_promises() {
    let mut event_loop = EventLoop::new();
    let source = delayed(&event_loop.scheduler(), 1, "shared");
    let a = source.observe();
    let b = source.observe();
    assert!(!a.ptr_eq(&b));

    assert_eq!(event_loop.run_until_settled(&a).unwrap(), "shared");
    assert_eq!(event_loop.run_until_settled(&b).unwrap(), "shared");
}

#[test]
fn with_timeout_rejects_when_source_is_slow() {
    let mut event_loop = EventLoop::new();
    let slow = delayed(&event_loop.scheduler(), 200, 1);
    let guarded = slow.with_timeout(Duration::from_millis(5));
    let error = event_loop.run_until_settled(&guarded).unwrap_err();
    assert!(matches!(error, PromiseError::Timeout(d) if d == Duration::from_millis(5)));
}

#[test]
fn with_timeout_mirrors_fast_source() {
    let mut event_loop = EventLoop::new();
    let fast = delayed(&event_loop.scheduler(), 1, 9);
    let guarded = fast.with_timeout(Duration::from_secs(5));
    assert_eq!(event_loop.run_until_settled(&guarded).unwrap(), 9);
    event_loop.run_until_idle();
    assert_eq!(event_loop.pending_delayed(), 0);
}

#[test]
fn wait_on_owner_thread_is_deadlock() {
    let event_loop = EventLoop::new();
    let promise = Promise::fulfilled(&event_loop.scheduler(), 1);
    assert!(matches!(promise.wait(), Err(PromiseError::Deadlock)));
}

#[test]
fn wait_timeout_gives_up() {
    let event_loop = EventLoop::new();
    let promise: Promise<u8> = delayed(&event_loop.scheduler(), 1, 1);
    let error = thread::spawn(move || promise.wait_timeout(Duration::from_millis(10)))
        .join()
        .unwrap()
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Timeout);
}

#[test]
fn outcome_accessors() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let ok = Promise::fulfilled(&scheduler, 3);
    assert_eq!(ok.state(), PromiseState::Fulfilled);
    assert!(matches!(ok.outcome(), Some(Settled::Fulfilled(3))));

    let failed = Promise::<u8>::rejected(&scheduler, PromiseError::rejected("r"));
    assert_eq!(failed.state(), PromiseState::Rejected);
    assert!(failed.value().is_none());
    assert_eq!(failed.error().map(|e| e.to_string()), Some("r".to_string()));
}
