//! First-to-settle race.

use crate::promise::{Promise, Step};
use crate::scheduler::SchedulerRef;

/// Settles like whichever input settles first, fulfilled or rejected.
///
/// Ties are broken by scheduler delivery order. Losing inputs keep running;
/// their outcomes are discarded. An empty input never settles.
///
/// # Example
///
/// ```
/// use thenable::{LabScheduler, Promise, any};
///
/// let lab = LabScheduler::new();
/// let slow: Promise<&str> = Promise::new(lab.handle());
/// let fast: Promise<&str> = Promise::new(lab.handle());
/// let winner = any(lab.handle(), [slow.clone(), fast.clone()]);
///
/// fast.resolve("fast");
/// lab.run_until_idle().expect("lab run");
/// slow.resolve("slow");
/// lab.run_until_idle().expect("lab run");
/// assert_eq!(winner.outcome().and_then(Result::ok), Some("fast"));
/// ```
pub fn any<T, I>(scheduler: SchedulerRef, inputs: I) -> Promise<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let aggregate = Promise::new(scheduler);
    for input in inputs {
        let on_value = aggregate.clone();
        let on_reason = aggregate.clone();
        let _ = input.then(
            move |value| {
                if on_value.resolve(value) {
                    trace!(aggregate = %on_value.id(), "any: fulfilled by input");
                }
                Step::Value(())
            },
            move |reason| {
                if on_reason.reject(reason) {
                    trace!(aggregate = %on_reason.id(), "any: rejected by input");
                }
                Step::Value(())
            },
        );
    }
    aggregate
}
