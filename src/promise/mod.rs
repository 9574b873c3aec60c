//! The promise settlement state machine.
//!
//! A [`Promise`] starts `Pending` and settles at most once, into either
//! `Fulfilled` or `Rejected`. Consumers register reactions with
//! [`then`](Promise::then) and its variants; every reaction gets a brand new
//! derived promise, settled from the handler's [`Step`].
//!
//! # Delivery
//!
//! Handlers never run synchronously. Settlement empties the reaction queue
//! and defers one drain job on the promise's [`Scheduler`](crate::Scheduler);
//! a registration on an already-settled promise defers a drain of just that
//! reaction. Jobs run in FIFO order, so reactions fire in registration order.
//!
//! # Locking
//!
//! Each promise guards its state and reaction queue with one mutex. Drain
//! jobs are handed to the scheduler while it is held, so jobs for one promise
//! reach the scheduler in registration order even across threads. Handlers
//! and thenable subscriptions run after the lock is released, so a handler
//! may freely touch the promise that invoked it. The lock order is always
//! promise, then scheduler; [`Scheduler::defer`](crate::Scheduler::defer)
//! never runs a job inline.
//!
//! # Example
//!
//! ```
//! use thenable::{LabScheduler, Promise, Reason, Step};
//!
//! let lab = LabScheduler::new();
//! let source: Promise<String> = Promise::new(lab.handle());
//!
//! let recovered = source
//!     .and_then(|s: String| Step::fault(format!("bad input: {s}")))
//!     .then(
//!         |n: usize| Step::value(n),
//!         |reason: Reason| Step::value(reason.to_string().len()),
//!     );
//!
//! source.resolve("xyz".to_string());
//! lab.run_until_idle().expect("lab run");
//! assert_eq!(recovered.outcome().and_then(Result::ok), Some(14));
//! ```

mod id;
mod reaction;
mod thenable;
mod wait;

pub use id::PromiseId;
pub use thenable::{Settle, Step, Thenable};
pub use wait::PromiseFuture;

use crate::error::{Error, Reason, panic_message};
use crate::scheduler::SchedulerRef;
use parking_lot::Mutex;
use reaction::{AdoptReaction, OnFulfilled, Reaction, ThenReaction};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Externally visible settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not settled yet (including while following a thenable).
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

enum State<T> {
    Pending,
    /// Locked in to a thenable's outcome; producer calls are ignored.
    Following,
    Fulfilled(T),
    Rejected(Reason),
}

impl<T> State<T> {
    const fn status(&self) -> Status {
        match self {
            Self::Pending | Self::Following => Status::Pending,
            Self::Fulfilled(_) => Status::Fulfilled,
            Self::Rejected(_) => Status::Rejected,
        }
    }
}

/// Who is trying to settle the promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settler {
    /// `resolve`/`reject`: only a `Pending` promise accepts it.
    Producer,
    /// A followed thenable reporting back: only a `Following` promise accepts it.
    Adoption,
}

type ReactionQueue<T> = VecDeque<Box<dyn Reaction<T>>>;

struct Core<T> {
    state: State<T>,
    reactions: ReactionQueue<T>,
}

struct Inner<T> {
    id: PromiseId,
    scheduler: SchedulerRef,
    core: Mutex<Core<T>>,
}

/// A write-once container for an eventual value or rejection reason.
///
/// Cloning a `Promise` clones the handle; all clones observe and settle the
/// same underlying state.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Promise")
            .field("id", &self.inner.id)
            .field("status", &core.state.status())
            .field("following", &matches!(core.state, State::Following))
            .field("reactions", &core.reactions.len())
            .finish()
    }
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending promise whose reactions run on `scheduler`.
    #[must_use]
    pub fn new(scheduler: SchedulerRef) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: PromiseId::next(),
                scheduler,
                core: Mutex::new(Core {
                    state: State::Pending,
                    reactions: VecDeque::new(),
                }),
            }),
        }
    }

    /// Creates a promise already fulfilled with `value`.
    #[must_use]
    pub fn resolved(scheduler: SchedulerRef, value: T) -> Self {
        let promise = Self::new(scheduler);
        promise.resolve(value);
        promise
    }

    /// Creates a promise already rejected with `reason`.
    #[must_use]
    pub fn rejected(scheduler: SchedulerRef, reason: impl Into<Reason>) -> Self {
        let promise = Self::new(scheduler);
        promise.reject(reason);
        promise
    }

    /// Returns this promise's identifier.
    #[must_use]
    pub fn id(&self) -> PromiseId {
        self.inner.id
    }

    /// Returns the scheduler reactions are delivered on.
    #[must_use]
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.inner.scheduler
    }

    /// Returns the current settlement status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.core.lock().state.status()
    }

    /// Returns `true` until the promise settles.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    /// Returns the settled outcome, or `None` while pending.
    #[must_use]
    pub fn outcome(&self) -> Option<Result<T, Reason>> {
        match &self.inner.core.lock().state {
            State::Pending | State::Following => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Fulfills the promise with `value`.
    ///
    /// Only the first settlement counts. Calling this on a settled promise,
    /// or one following a thenable, does nothing and returns `false`.
    pub fn resolve(&self, value: T) -> bool {
        self.transition(Ok(value), Settler::Producer)
    }

    /// Rejects the promise with `reason`.
    ///
    /// Only the first settlement counts. Calling this on a settled promise,
    /// or one following a thenable, does nothing and returns `false`.
    pub fn reject(&self, reason: impl Into<Reason>) -> bool {
        self.transition(Err(reason.into()), Settler::Producer)
    }

    /// Locks the promise in to the eventual outcome of `source`.
    ///
    /// The promise stays pending until `source` settles and then mirrors it.
    /// From this call on, `resolve` and `reject` are ignored. Adopting a
    /// promise's own outcome rejects it with [`Error::SelfResolution`].
    pub fn adopt<S>(&self, source: S)
    where
        S: Thenable<T> + 'static,
    {
        self.follow(Box::new(source));
    }

    /// Registers both a fulfillment and a rejection handler.
    ///
    /// Returns a new promise settled from whichever handler runs. A handler
    /// returning normally (even the rejection handler) fulfills it, unless
    /// it returns [`Step::Fault`] or panics.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
        R: FnOnce(Reason) -> Step<U> + Send + 'static,
    {
        self.chain(
            OnFulfilled::Handler(Box::new(on_fulfilled)),
            Some(Box::new(on_rejected)),
        )
    }

    /// Registers optional handlers.
    ///
    /// An absent fulfillment handler passes the value through (converted with
    /// [`Into`]); an absent rejection handler passes the reason through.
    pub fn then_with<U, F, R>(&self, on_fulfilled: Option<F>, on_rejected: Option<R>) -> Promise<U>
    where
        T: Into<U>,
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
        R: FnOnce(Reason) -> Step<U> + Send + 'static,
    {
        let on_fulfilled = match on_fulfilled {
            Some(handler) => OnFulfilled::Handler(Box::new(handler) as reaction::FulfillHandler<T, U>),
            None => OnFulfilled::Forward(Into::into),
        };
        let on_rejected = on_rejected.map(|handler| Box::new(handler) as reaction::RejectHandler<U>);
        self.chain(on_fulfilled, on_rejected)
    }

    /// Registers a fulfillment handler; rejections pass through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Step<U> + Send + 'static,
    {
        self.chain(OnFulfilled::Handler(Box::new(on_fulfilled)), None)
    }

    /// Registers a rejection handler; values pass through unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Self
    where
        R: FnOnce(Reason) -> Step<T> + Send + 'static,
    {
        self.chain(OnFulfilled::Forward(std::convert::identity), Some(Box::new(on_rejected)))
    }

    /// Maps the fulfilled value with a plain function; rejections pass through.
    pub fn map<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(move |value| Step::Value(f(value)))
    }

    /// Returns a future that completes with this promise's outcome.
    ///
    /// The outcome is delivered through the scheduler like any other
    /// reaction, so the scheduler must be running for the future to finish.
    pub fn settled(&self) -> PromiseFuture<T> {
        PromiseFuture::register(self)
    }

    fn chain<U>(
        &self,
        on_fulfilled: OnFulfilled<T, U>,
        on_rejected: Option<reaction::RejectHandler<U>>,
    ) -> Promise<U>
    where
        U: Clone + Send + 'static,
    {
        let derived = Promise::new(Arc::clone(&self.inner.scheduler));
        self.register(Box::new(ThenReaction {
            on_fulfilled,
            on_rejected,
            derived: derived.clone(),
        }));
        derived
    }

    /// Queues `reaction`, or defers it straight away if already settled.
    pub(crate) fn register(&self, reaction: Box<dyn Reaction<T>>) {
        let mut core = self.inner.core.lock();
        let settled = match &core.state {
            State::Pending | State::Following => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        };
        let Some(outcome) = settled else {
            core.reactions.push_back(reaction);
            trace!(
                promise = %self.inner.id,
                queued = core.reactions.len(),
                "reaction queued"
            );
            return;
        };
        trace!(promise = %self.inner.id, "reaction registered after settlement");
        // Deferred under the lock so a concurrent settlement's batch job
        // cannot be overtaken.
        self.schedule_drain(outcome, VecDeque::from([reaction]));
        drop(core);
    }

    /// Settles the promise if `settler` is allowed to, then defers the drain.
    fn transition(&self, outcome: Result<T, Reason>, settler: Settler) -> bool {
        let mut core = self.inner.core.lock();
        let allowed = matches!(
            (&core.state, settler),
            (State::Pending, Settler::Producer) | (State::Following, Settler::Adoption)
        );
        if !allowed {
            trace!(
                promise = %self.inner.id,
                status = ?core.state.status(),
                ?settler,
                "settlement ignored"
            );
            return false;
        }
        core.state = match &outcome {
            Ok(value) => State::Fulfilled(value.clone()),
            Err(reason) => State::Rejected(reason.clone()),
        };
        let batch = std::mem::take(&mut core.reactions);
        debug!(
            promise = %self.inner.id,
            fulfilled = outcome.is_ok(),
            reactions = batch.len(),
            "promise settled"
        );
        if !batch.is_empty() {
            self.schedule_drain(outcome, batch);
        }
        drop(core);
        true
    }

    fn schedule_drain(&self, outcome: Result<T, Reason>, batch: ReactionQueue<T>) {
        self.inner
            .scheduler
            .defer(Box::new(move || drain(outcome, batch)));
    }

    /// Settles from a handler's result.
    pub(crate) fn apply(&self, step: Step<T>) {
        match step {
            Step::Value(value) => {
                self.resolve(value);
            }
            Step::Fault(reason) => {
                self.reject(reason);
            }
            Step::Adopt(source) => self.follow(source),
        }
    }

    fn follow(&self, source: Box<dyn Thenable<T>>) {
        let id = self.inner.id;
        if source.promise_id() == Some(id) {
            debug!(promise = %id, "promise asked to adopt itself");
            self.reject(Error::SelfResolution { id });
            return;
        }
        {
            let mut core = self.inner.core.lock();
            if !matches!(core.state, State::Pending) {
                trace!(promise = %id, "adoption ignored; already settled or following");
                return;
            }
            core.state = State::Following;
        }
        trace!(promise = %id, source = ?source.promise_id(), "adopting thenable");
        let settle = Settle::new(self.clone());
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || source.subscribe(settle)))
        {
            let message = panic_message(payload.as_ref());
            debug!(promise = %id, %message, "thenable panicked during subscribe");
            self.complete_adoption(Err(Error::AdoptionPanicked { message }.into()));
        }
    }

    /// Reports the outcome of a followed thenable.
    pub(crate) fn complete_adoption(&self, outcome: Result<T, Reason>) {
        self.transition(outcome, Settler::Adoption);
    }

    /// Makes `settle`'s promise mirror this one.
    pub(crate) fn forward_to(&self, settle: Settle<T>) {
        self.register(Box::new(AdoptReaction { settle }));
    }
}

impl<T> std::future::IntoFuture for Promise<T>
where
    T: Clone + Send + 'static,
{
    type Output = Result<T, Reason>;
    type IntoFuture = PromiseFuture<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}

/// Services a batch of reactions with one outcome, in queue order.
fn drain<T>(outcome: Result<T, Reason>, mut batch: ReactionQueue<T>)
where
    T: Clone,
{
    trace!(reactions = batch.len(), "draining reactions");
    while let Some(reaction) = batch.pop_front() {
        match &outcome {
            Ok(value) => reaction.fulfill(value.clone()),
            Err(reason) => reaction.reject(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests;
