//! Rejection reasons and the promise error taxonomy.
//!
//! Every rejection travels as a [`PromiseError`]. Arbitrary application errors
//! are carried inside a [`Reason`], which keeps the original error object so
//! handlers can downcast to the type they expect.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error accepted by the `PromiseError` constructors.
///
/// Anything that converts into it works: concrete error types, `&str` and
/// `String` messages, or an already boxed error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type used by producers, handlers and blocking waits.
pub type PromiseResult<T> = Result<T, PromiseError>;

/// Broad classification of a [`PromiseError`].
///
/// Mirrors the variants of `PromiseError` without their payloads so callers
/// can branch on the origin of a rejection cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A reason supplied directly to `reject`
    Rejected,
    /// The initial producer failed synchronously
    Producer,
    /// A self-reference cycle or a misbehaving thenable
    Resolution,
    /// A chained handler failed
    Handler,
    /// An opaque carrier around another error
    Wrapped,
    /// A timeout elapsed
    Timeout,
    /// A blocking wait was attempted on the promise's own scheduler thread
    Deadlock,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Rejected => "rejected",
            ErrorKind::Producer => "producer",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Handler => "handler",
            ErrorKind::Wrapped => "wrapped",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Deadlock => "deadlock",
        };
        f.write_str(name)
    }
}

/// An arbitrary error kept as a rejection reason.
///
/// Cloning is cheap; all clones share the same underlying error object.
///
/// # Examples
///
/// ```
/// use promise_types::Reason;
/// use std::io;
///
/// let reason = Reason::new(io::Error::new(io::ErrorKind::NotFound, "missing"));
/// assert_eq!(reason.to_string(), "missing");
/// assert!(reason.downcast_ref::<io::Error>().is_some());
/// ```
#[derive(Clone)]
pub struct Reason(Arc<dyn StdError + Send + Sync + 'static>);

impl Reason {
    /// Creates a reason from any error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Reason(Arc::new(error))
    }

    /// Creates a reason from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Reason::new(Message(message.into()))
    }

    /// Returns the underlying error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns the underlying error object.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Returns true if both reasons share the same error object.
    pub fn ptr_eq(&self, other: &Reason) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<BoxError> for Reason {
    fn from(error: BoxError) -> Self {
        Reason(Arc::from(error))
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Why a promise was rejected.
///
/// # Examples
///
/// ```
/// use promise_types::{ErrorKind, PromiseError};
///
/// let error = PromiseError::rejected("disk full");
/// assert_eq!(error.kind(), ErrorKind::Rejected);
/// assert_eq!(error.to_string(), "disk full");
///
/// // Wrapping is idempotent and unwrapping strips every layer.
/// let wrapped = error.clone().wrap().wrap();
/// assert_eq!(wrapped.kind(), ErrorKind::Wrapped);
/// assert_eq!(wrapped.into_cause().kind(), ErrorKind::Rejected);
/// ```
#[derive(Debug, Clone, Error)]
pub enum PromiseError {
    /// A reason supplied directly to `reject`.
    #[error("{0}")]
    Rejected(Reason),

    /// The producer passed to a promise constructor failed synchronously.
    ///
    /// Producers choose this label themselves through
    /// [`PromiseError::producer`]; errors they return are stored as is.
    #[error("producer failed: {0}")]
    Producer(Reason),

    /// A `then` handler failed.
    ///
    /// Handlers choose this label themselves through
    /// [`PromiseError::handler`]; errors they return are stored as is.
    #[error("handler failed: {0}")]
    Handler(Reason),

    /// A promise was resolved with itself.
    #[error("a promise cannot be resolved with itself")]
    SelfResolution,

    /// A thenable broke its settlement contract.
    ///
    /// Never raised by the runtime itself. Implementations of
    /// `async_runtime::Thenable` return it from `settle_into` when the foreign
    /// value they wrap misbehaves.
    #[error("thenable contract violated: {0}")]
    Thenable(String),

    /// Opaque carrier for an error crossing an interface that cannot name it.
    #[error("{0}")]
    Wrapped(Box<PromiseError>),

    /// A timeout elapsed before the promise settled.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A blocking wait was attempted on the thread that has to settle the promise.
    #[error("blocking wait on the owning scheduler thread would deadlock")]
    Deadlock,
}

impl PromiseError {
    /// Builds a plain rejection reason.
    pub fn rejected(error: impl Into<BoxError>) -> Self {
        Self::classify(error.into(), PromiseError::Rejected)
    }

    /// Builds an error for a producer that failed synchronously.
    pub fn producer(error: impl Into<BoxError>) -> Self {
        Self::classify(error.into(), PromiseError::Producer)
    }

    /// Builds an error for a failing `then` handler.
    pub fn handler(error: impl Into<BoxError>) -> Self {
        Self::classify(error.into(), PromiseError::Handler)
    }

    /// Wraps `error` in the opaque carrier.
    ///
    /// Wrapping something that already is a wrapped `PromiseError` returns it
    /// unchanged.
    pub fn wrap_error(error: impl Into<BoxError>) -> Self {
        PromiseError::rejected(error).wrap()
    }

    // A PromiseError passed through a constructor is returned as is.
    fn classify(error: BoxError, make: fn(Reason) -> PromiseError) -> Self {
        match error.downcast::<PromiseError>() {
            Ok(inner) => *inner,
            Err(other) => make(Reason::from(other)),
        }
    }

    /// Puts this error inside the opaque carrier unless it already is one.
    pub fn wrap(self) -> Self {
        match self {
            PromiseError::Wrapped(_) => self,
            other => PromiseError::Wrapped(Box::new(other)),
        }
    }

    /// Strips every wrapper layer and returns the innermost error.
    pub fn into_cause(self) -> Self {
        let mut error = self;
        while let PromiseError::Wrapped(inner) = error {
            error = *inner;
        }
        error
    }

    /// Returns true if this error is a wrapper.
    pub fn is_wrapped(&self) -> bool {
        matches!(self, PromiseError::Wrapped(_))
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PromiseError::Rejected(_) => ErrorKind::Rejected,
            PromiseError::Producer(_) => ErrorKind::Producer,
            PromiseError::Handler(_) => ErrorKind::Handler,
            PromiseError::SelfResolution | PromiseError::Thenable(_) => ErrorKind::Resolution,
            PromiseError::Wrapped(_) => ErrorKind::Wrapped,
            PromiseError::Timeout(_) => ErrorKind::Timeout,
            PromiseError::Deadlock => ErrorKind::Deadlock,
        }
    }

    /// Returns the application reason carried by this error, looking through
    /// wrapper layers.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            PromiseError::Rejected(reason)
            | PromiseError::Producer(reason)
            | PromiseError::Handler(reason) => Some(reason),
            PromiseError::Wrapped(inner) => inner.reason(),
            _ => None,
        }
    }

    /// Returns the application error if it is of type `E`.
    pub fn cause<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.reason().and_then(Reason::downcast_ref::<E>)
    }
}
