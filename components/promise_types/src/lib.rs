//! Core promise types and error handling.
//!
//! This crate provides the value-level vocabulary shared by the promise
//! runtime: promise states, settled outcomes and the rejection taxonomy.
//!
//! # Overview
//!
//! - [`PromiseState`] - Pending / Fulfilled / Rejected
//! - [`Settled`] - The terminal outcome of a promise
//! - [`PromiseError`] - Why a promise was rejected
//! - [`ErrorKind`] - Payload-free classification of a `PromiseError`
//! - [`Reason`] - An arbitrary application error used as a rejection reason
//!
//! # Examples
//!
//! ```
//! use promise_types::{ErrorKind, PromiseError, Settled};
//!
//! let outcome: Settled<u32> = Settled::Rejected(PromiseError::rejected("boom"));
//! match outcome.into_result() {
//!     Ok(_) => unreachable!(),
//!     Err(error) => assert_eq!(error.kind(), ErrorKind::Rejected),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod state;

pub use error::{BoxError, ErrorKind, PromiseError, PromiseResult, Reason};
pub use state::{PromiseState, Settled};
