//! Scheduler-confined promises.
//!
//! This crate provides an asynchronous result type whose whole life runs on a
//! single-threaded scheduler:
//! - Event loop with an immediate task queue and a delayed task queue
//! - Promise with chaining, error recovery and thenable flattening
//! - Combinators (`all`, `race`, `series`, `timeout`) and externally settled
//!   deferreds
//!
//! # Overview
//!
//! - [`EventLoop`] - Run loop that promises are confined to
//! - [`Scheduler`] - Seam for plugging in a host run loop instead
//! - [`Promise`] - Three-state asynchronous result
//! - [`Resolution`] - Candidate result: a value, a promise or a [`Thenable`]
//! - [`Deferred`] - Promise paired with the right to settle it
//! - [`PromiseFactory`] - Producer that starts a fresh promise per call
//!
//! Promise handles and resolvers are `Send + Sync` and may be used from any
//! thread. State changes and handlers always run on the owning scheduler.
//!
//! # Examples
//!
//! ## Event Loop Usage
//!
//! ```
//! use async_runtime::{EventLoop, Scheduler, Task};
//!
//! let mut event_loop = EventLoop::new();
//! event_loop.handle().post(Task::new(|| println!("ran")));
//! event_loop.run_until_idle();
//! ```
//!
//! ## Promise Usage
//!
//! ```
//! use async_runtime::{EventLoop, Promise, PromiseError, Resolution};
//!
//! let mut event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let recovered = Promise::<i32>::rejected(&scheduler, PromiseError::rejected("offline"))
//!     .catch(|_| Ok(Resolution::Value(0)))
//!     .map(|v| v + 1);
//! assert_eq!(event_loop.run_until_settled(&recovered).unwrap(), 1);
//! ```
//!
//! ## Combinator Usage
//!
//! ```
//! use async_runtime::{series, EventLoop, Resolver};
//!
//! let mut event_loop = EventLoop::new();
//! let steps = (1..=3).map(|n| {
//!     move |resolver: Resolver<i32>| {
//!         resolver.resolve(n * n);
//!         Ok(())
//!     }
//! });
//! let squares = series(&event_loop.scheduler(), steps);
//! assert_eq!(event_loop.run_until_settled(&squares).unwrap(), vec![1, 4, 9]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod combinators;
pub mod config;
pub mod deferred;
pub mod event_loop;
pub mod factory;
pub mod promise;
pub mod resolution;
pub mod resolver;
pub mod scheduler;
pub mod task_queue;

// Re-export main types at crate root
pub use combinators::{all, race, series, timeout};
pub use config::EventLoopConfig;
pub use deferred::Deferred;
pub use event_loop::{EventLoop, LoopHandle};
pub use factory::PromiseFactory;
pub use promise::Promise;
pub use resolution::{Resolution, Thenable};
pub use resolver::Resolver;
pub use scheduler::{same_scheduler, Scheduler, SharedScheduler};
pub use task_queue::{Task, TaskHandle};

pub use promise_types::{
    BoxError, ErrorKind, PromiseError, PromiseResult, PromiseState, Reason, Settled,
};
