//! The thenable capability and handler results.
//!
//! Any type that can report an eventual outcome implements [`Thenable`].
//! A handler that returns [`Step::Adopt`] hands such a value back, and the
//! derived promise mirrors its outcome instead of holding it as a value.
//! [`Promise`] implements `Thenable`, so chains of promises flatten.

use super::{Promise, PromiseId};
use crate::error::Reason;

/// A value that eventually settles and can report how.
///
/// `subscribe` is called at most once. The implementation must eventually
/// call exactly one of [`Settle::fulfill`] or [`Settle::reject`], from any
/// thread, at any time (including before `subscribe` returns). Never calling
/// either leaves the adopting promise pending forever.
pub trait Thenable<T>: Send {
    /// Registers `settle` to receive this thenable's outcome.
    fn subscribe(self: Box<Self>, settle: Settle<T>);

    /// Identity of the promise behind this thenable, if it is one.
    ///
    /// Used to reject a promise that is asked to adopt itself.
    fn promise_id(&self) -> Option<PromiseId> {
        None
    }
}

/// The one-shot completion capability handed to [`Thenable::subscribe`].
///
/// Both methods consume the handle, so a thenable can settle its follower
/// at most once.
#[derive(Debug)]
pub struct Settle<T> {
    target: Promise<T>,
}

impl<T> Settle<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) const fn new(target: Promise<T>) -> Self {
        Self { target }
    }

    /// Fulfills the following promise with `value`.
    pub fn fulfill(self, value: T) {
        self.target.complete_adoption(Ok(value));
    }

    /// Rejects the following promise with `reason`.
    pub fn reject(self, reason: impl Into<Reason>) {
        self.target.complete_adoption(Err(reason.into()));
    }
}

/// What a handler produced.
///
/// - `Value`: a plain result; the derived promise fulfills with it.
/// - `Adopt`: a thenable; the derived promise mirrors its eventual outcome.
/// - `Fault`: the handler failed; the derived promise rejects with the reason.
///
/// A handler that panics is treated like one returning `Fault`.
pub enum Step<U> {
    /// Fulfill the derived promise with this value.
    Value(U),
    /// Follow this thenable's outcome.
    Adopt(Box<dyn Thenable<U>>),
    /// Reject the derived promise with this reason.
    Fault(Reason),
}

impl<U> Step<U> {
    /// Fulfill with `value`.
    pub fn value(value: U) -> Self {
        Self::Value(value)
    }

    /// Follow `thenable`.
    pub fn adopt<S>(thenable: S) -> Self
    where
        S: Thenable<U> + 'static,
    {
        Self::Adopt(Box::new(thenable))
    }

    /// Reject with `reason`.
    pub fn fault(reason: impl Into<Reason>) -> Self {
        Self::Fault(reason.into())
    }
}

impl<U, E> From<Result<U, E>> for Step<U>
where
    E: Into<Reason>,
{
    fn from(result: Result<U, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Fault(err.into()),
        }
    }
}

impl<U> std::fmt::Debug for Step<U>
where
    U: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Adopt(thenable) => f
                .debug_tuple("Adopt")
                .field(&thenable.promise_id())
                .finish(),
            Self::Fault(reason) => f.debug_tuple("Fault").field(reason).finish(),
        }
    }
}

impl<T> Thenable<T> for Promise<T>
where
    T: Clone + Send + 'static,
{
    fn subscribe(self: Box<Self>, settle: Settle<T>) {
        self.forward_to(settle);
    }

    fn promise_id(&self) -> Option<PromiseId> {
        Some(self.id())
    }
}
