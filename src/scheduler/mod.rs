//! Deferred-call schedulers.
//!
//! Promises never invoke handlers themselves; they hand a [`Job`] to the
//! [`Scheduler`] they were created with. A scheduler guarantees that the job
//! runs later (never inside the `defer` call), exactly once, and in FIFO
//! order relative to other jobs deferred on it.
//!
//! - [`LabScheduler`]: deterministic queue stepped explicitly by the caller
//! - [`ThreadScheduler`]: a background worker thread draining the queue
//!
//! Host environments with their own event loop implement [`Scheduler`]
//! directly.

pub mod lab;
pub mod thread;

pub use lab::LabScheduler;
pub use thread::{ThreadScheduler, ThreadSchedulerBuilder};

use std::sync::Arc;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to a scheduler, carried by every promise.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// The deferred-call primitive promises are built on.
///
/// Implementations must not run `job` before `defer` returns, must run it
/// exactly once, and must run jobs in the order they were deferred.
pub trait Scheduler: Send + Sync + 'static {
    /// Queues `job` to run later.
    fn defer(&self, job: Job);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn defer(&self, job: Job) {
        (**self).defer(job);
    }
}
