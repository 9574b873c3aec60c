//! Reactions: one record per `then` registration.

use super::thenable::{Settle, Step};
use super::Promise;
use crate::error::Reason;
use std::panic::{self, AssertUnwindSafe};

pub(crate) type FulfillHandler<T, U> = Box<dyn FnOnce(T) -> Step<U> + Send>;
pub(crate) type RejectHandler<U> = Box<dyn FnOnce(Reason) -> Step<U> + Send>;

/// A queued consumer of a promise's outcome. Exactly one method is called,
/// exactly once, always from a scheduler job.
pub(crate) trait Reaction<T>: Send {
    fn fulfill(self: Box<Self>, value: T);
    fn reject(self: Box<Self>, reason: Reason);
}

/// The fulfillment slot of a `then` registration.
///
/// `Forward` is the absent handler: the value passes through to the derived
/// promise, converted to its type.
pub(crate) enum OnFulfilled<T, U> {
    Handler(FulfillHandler<T, U>),
    Forward(fn(T) -> U),
}

/// The reaction created by `then` and its variants.
pub(crate) struct ThenReaction<T, U> {
    pub(crate) on_fulfilled: OnFulfilled<T, U>,
    pub(crate) on_rejected: Option<RejectHandler<U>>,
    pub(crate) derived: Promise<U>,
}

impl<T, U> Reaction<T> for ThenReaction<T, U>
where
    T: Send + 'static,
    U: Clone + Send + 'static,
{
    fn fulfill(self: Box<Self>, value: T) {
        let Self {
            on_fulfilled,
            derived,
            ..
        } = *self;
        match on_fulfilled {
            OnFulfilled::Handler(handler) => derived.apply(invoke(handler, value)),
            // The conversion is caller code too; a panic in it is a fault.
            OnFulfilled::Forward(forward) => {
                derived.apply(invoke(move |value| Step::Value(forward(value)), value));
            }
        }
    }

    fn reject(self: Box<Self>, reason: Reason) {
        let Self {
            on_rejected,
            derived,
            ..
        } = *self;
        match on_rejected {
            Some(handler) => derived.apply(invoke(handler, reason)),
            None => {
                derived.reject(reason);
            }
        }
    }
}

/// Feeds a source promise's outcome into a promise that is adopting it.
pub(crate) struct AdoptReaction<T> {
    pub(crate) settle: Settle<T>,
}

impl<T> Reaction<T> for AdoptReaction<T>
where
    T: Clone + Send + 'static,
{
    fn fulfill(self: Box<Self>, value: T) {
        self.settle.fulfill(value);
    }

    fn reject(self: Box<Self>, reason: Reason) {
        self.settle.reject(reason);
    }
}

/// Runs a handler, turning a panic into [`Step::Fault`].
fn invoke<A, U>(handler: impl FnOnce(A) -> Step<U>, arg: A) -> Step<U> {
    match panic::catch_unwind(AssertUnwindSafe(move || handler(arg))) {
        Ok(step) => step,
        Err(payload) => {
            let reason = Reason::from_panic(payload.as_ref());
            debug!(%reason, "handler panicked; rejecting derived promise");
            Step::Fault(reason)
        }
    }
}
