//! Wait-for-all aggregation.

use crate::promise::{Promise, Step};
use crate::scheduler::SchedulerRef;
use parking_lot::Mutex;
use std::sync::Arc;

/// Result slots for one `all` call; `None` marks an input still outstanding.
struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

impl<T> Gather<T> {
    /// Records `value` for input `index`. Returns the full ordered result once
    /// every slot is filled.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        let slot = &mut self.slots[index];
        if slot.is_none() {
            *slot = Some(value);
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        self.slots.iter_mut().map(Option::take).collect()
    }
}

/// Fulfills with every input's value, in input order, once all have
/// fulfilled. Rejects with the first rejection observed.
///
/// An empty input fulfills with an empty vector.
///
/// # Example
///
/// ```
/// use thenable::{LabScheduler, Promise, all};
///
/// let lab = LabScheduler::new();
/// let a: Promise<u8> = Promise::new(lab.handle());
/// let b: Promise<u8> = Promise::new(lab.handle());
/// let both = all(lab.handle(), [a.clone(), b.clone()]);
///
/// b.resolve(2);
/// a.resolve(1);
/// lab.run_until_idle().expect("lab run");
/// assert_eq!(both.outcome().and_then(Result::ok), Some(vec![1, 2]));
/// ```
pub fn all<T, I>(scheduler: SchedulerRef, inputs: I) -> Promise<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let inputs: Vec<Promise<T>> = inputs.into_iter().collect();
    let aggregate = Promise::new(scheduler);
    trace!(aggregate = %aggregate.id(), inputs = inputs.len(), "all: registering");

    if inputs.is_empty() {
        aggregate.resolve(Vec::new());
        return aggregate;
    }

    let gather = Arc::new(Mutex::new(Gather {
        slots: inputs.iter().map(|_| None).collect(),
        remaining: inputs.len(),
    }));

    for (index, input) in inputs.iter().enumerate() {
        let gather = Arc::clone(&gather);
        let on_value = aggregate.clone();
        let on_reason = aggregate.clone();
        let _ = input.then(
            move |value| {
                let complete = gather.lock().fill(index, value);
                if let Some(values) = complete {
                    on_value.resolve(values);
                }
                Step::Value(())
            },
            move |reason| {
                if on_reason.reject(reason) {
                    debug!(aggregate = %on_reason.id(), index, "all: rejected by input");
                }
                Step::Value(())
            },
        );
    }
    aggregate
}
