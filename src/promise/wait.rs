//! Awaiting a promise from async code.

use super::Promise;
use super::reaction::Reaction;
use crate::error::Reason;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Future returned by [`Promise::settled`] and `Promise::into_future`.
///
/// Completes with `Ok(value)` or `Err(reason)` once the promise's outcome has
/// been delivered by its scheduler. Must not be polled after completion.
#[derive(Debug)]
pub struct PromiseFuture<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

#[derive(Debug)]
struct Slot<T> {
    outcome: Option<Result<T, Reason>>,
    waker: Option<Waker>,
}

struct WakeReaction<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> WakeReaction<T> {
    fn deliver(self, outcome: Result<T, Reason>) {
        let waker = {
            let mut slot = self.slot.lock();
            slot.outcome = Some(outcome);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send> Reaction<T> for WakeReaction<T> {
    fn fulfill(self: Box<Self>, value: T) {
        self.deliver(Ok(value));
    }

    fn reject(self: Box<Self>, reason: Reason) {
        self.deliver(Err(reason));
    }
}

impl<T> PromiseFuture<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn register(promise: &Promise<T>) -> Self {
        let slot = Arc::new(Mutex::new(Slot {
            outcome: None,
            waker: None,
        }));
        promise.register(Box::new(WakeReaction {
            slot: Arc::clone(&slot),
        }));
        Self { slot }
    }
}

impl<T> Future for PromiseFuture<T> {
    type Output = Result<T, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        if let Some(outcome) = slot.outcome.take() {
            return Poll::Ready(outcome);
        }
        match &slot.waker {
            Some(waker) if waker.will_wake(cx.waker()) => {}
            _ => slot.waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}
