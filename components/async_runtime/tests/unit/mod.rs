//! Unit tests for async_runtime

mod promise_test;
mod resolution_test;
