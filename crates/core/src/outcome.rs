//! Synchronous settled results.
//!
//! [`Outcome`] is the terminal half of the state machine: a computation that
//! has already finished, either with a value or with a [`DomainError`]. The
//! asynchronous cell in [`crate::cell`] settles into one of these.

use surety_types::{DomainError, UnwrapError};

/// A settled computation result: success carrying a value, or a domain error.
///
/// `Outcome` wraps `Result<T, DomainError>` and adds the chaining and
/// inspection surface the rest of the crate builds on. It converts freely
/// to and from `Result`, so `?` works at the boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T>(Result<T, DomainError>);

impl<T> Outcome<T> {
    /// A successful outcome carrying `value`.
    pub fn ok(value: T) -> Self {
        Self(Ok(value))
    }

    /// A failed outcome carrying `error`.
    ///
    /// Accepts anything that converts into a [`DomainError`], so a bare
    /// error code string is enough: `Outcome::<u32>::err("not-found")`.
    pub fn err(error: impl Into<DomainError>) -> Self {
        Self(Err(error.into()))
    }

    /// A failed outcome built from an error code plus a human-readable message.
    pub fn err_with(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self(Err(DomainError::new(code).with_message(message)))
    }

    /// Runs a fallible closure and captures its result.
    pub fn run(f: impl FnOnce() -> Result<T, DomainError>) -> Self {
        Self(f())
    }

    /// Runs a closure whose error type differs from [`DomainError`],
    /// mapping the error through `map_err` on failure.
    pub fn try_call<E>(
        f: impl FnOnce() -> Result<T, E>,
        map_err: impl FnOnce(E) -> DomainError,
    ) -> Self {
        Self(f().map_err(map_err))
    }

    /// Awaits a fallible future, mapping its error through `map_err` on failure.
    pub async fn try_future<E>(
        fut: impl Future<Output = Result<T, E>>,
        map_err: impl FnOnce(E) -> DomainError,
    ) -> Self {
        Self(fut.await.map_err(map_err))
    }

    /// True when this outcome carries a value.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.0.is_ok()
    }

    /// True when this outcome carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0.is_err()
    }

    /// The success value, if any.
    pub fn value(&self) -> Option<&T> {
        self.0.as_ref().ok()
    }

    /// The error, if any.
    pub fn error(&self) -> Option<&DomainError> {
        self.0.as_ref().err()
    }

    /// Consumes the outcome and returns the success value, if any.
    pub fn into_value(self) -> Option<T> {
        self.0.ok()
    }

    /// Returns the success value, panicking with [`UnwrapError`] if this
    /// outcome is an error.
    ///
    /// Calling `unwrap` on an error outcome is a caller bug. Use
    /// [`Outcome::into_result`] and `?` where the error is expected.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self.0 {
            Ok(value) => value,
            Err(error) => panic!("{}", UnwrapError(error)),
        }
    }

    /// Returns the success value, or `default` if this outcome is an error.
    pub fn unwrap_or(self, default: T) -> T {
        self.0.unwrap_or(default)
    }

    /// Returns the success value, or computes one from the error.
    pub fn unwrap_or_else(self, f: impl FnOnce(DomainError) -> T) -> T {
        self.0.unwrap_or_else(f)
    }

    /// Maps the success value, passing errors through untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome(self.0.map(f))
    }

    /// Maps the error, passing success values through untouched.
    pub fn map_err(self, f: impl FnOnce(DomainError) -> DomainError) -> Self {
        Self(self.0.map_err(f))
    }

    /// Chains a fallible step onto a success value.
    ///
    /// Errors short-circuit: the step never runs and the error is carried
    /// into the new outcome unchanged.
    pub fn chain<U>(self, f: impl FnOnce(T) -> Result<U, DomainError>) -> Outcome<U> {
        Outcome(self.0.and_then(f))
    }

    /// Chains a step that itself produces an [`Outcome`].
    pub fn flat_chain<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self.0 {
            Ok(value) => f(value),
            Err(error) => Outcome(Err(error)),
        }
    }

    /// Borrows the underlying result.
    pub fn as_result(&self) -> Result<&T, &DomainError> {
        self.0.as_ref()
    }

    /// Consumes the outcome into the underlying result.
    pub fn into_result(self) -> Result<T, DomainError> {
        self.0
    }
}

impl<T> From<Result<T, DomainError>> for Outcome<T> {
    fn from(result: Result<T, DomainError>) -> Self {
        Self(result)
    }
}

impl<T> From<Outcome<T>> for Result<T, DomainError> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.0
    }
}

impl<T> From<DomainError> for Outcome<T> {
    fn from(error: DomainError) -> Self {
        Self(Err(error))
    }
}
