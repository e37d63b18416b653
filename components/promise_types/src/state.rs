//! Promise states and settled outcomes.

use crate::error::{PromiseError, PromiseResult};

/// The state of a Promise.
///
/// Promises move from `Pending` to exactly one of the terminal states and
/// never change again afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    /// The initial state; the promise is neither fulfilled nor rejected.
    Pending,
    /// The promise has been resolved with a value.
    Fulfilled,
    /// The promise has been rejected with an error.
    Rejected,
}

impl PromiseState {
    /// Returns true for the two terminal states.
    pub fn is_settled(self) -> bool {
        !matches!(self, PromiseState::Pending)
    }
}

/// The terminal outcome of a promise.
///
/// # Examples
///
/// ```
/// use promise_types::{PromiseError, PromiseState, Settled};
///
/// let ok: Settled<i32> = Settled::Fulfilled(7);
/// assert_eq!(ok.state(), PromiseState::Fulfilled);
/// assert_eq!(ok.into_result().unwrap(), 7);
///
/// let err: Settled<i32> = Settled::Rejected(PromiseError::rejected("no"));
/// assert!(err.into_result().is_err());
/// ```
#[derive(Debug, Clone)]
pub enum Settled<T> {
    /// Settled with a value
    Fulfilled(T),
    /// Settled with an error
    Rejected(PromiseError),
}

impl<T> Settled<T> {
    /// Returns the terminal state this outcome corresponds to.
    pub fn state(&self) -> PromiseState {
        match self {
            Settled::Fulfilled(_) => PromiseState::Fulfilled,
            Settled::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Returns true if this outcome carries a value.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    /// Borrows the outcome as a `Result`.
    pub fn as_result(&self) -> Result<&T, &PromiseError> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(error) => Err(error),
        }
    }

    /// Converts the outcome into a `Result`.
    pub fn into_result(self) -> PromiseResult<T> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(error) => Err(error),
        }
    }

    /// Maps the fulfilled value, leaving a rejection untouched.
    pub fn map<U, F>(self, f: F) -> Settled<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Settled::Fulfilled(value) => Settled::Fulfilled(f(value)),
            Settled::Rejected(error) => Settled::Rejected(error),
        }
    }
}

impl<T> From<PromiseResult<T>> for Settled<T> {
    fn from(result: PromiseResult<T>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled(value),
            Err(error) => Settled::Rejected(error),
        }
    }
}
