//! Deterministic lab scheduler for testing.
//!
//! The [`LabScheduler`] never runs anything on its own. Deferred jobs wait in
//! a FIFO queue until the test calls [`step`](LabScheduler::step) or
//! [`run_until_idle`](LabScheduler::run_until_idle), so the exact moment each
//! promise handler fires is under test control.
//!
//! # Example
//!
//! ```
//! use thenable::{LabScheduler, Promise};
//!
//! let lab = LabScheduler::new();
//! let p: Promise<&str> = Promise::new(lab.handle());
//! let seen = p.map(str::len);
//!
//! p.resolve("four");
//! assert_eq!(lab.pending(), 1);
//!
//! lab.run_until_idle().expect("lab run");
//! assert_eq!(seen.outcome().and_then(Result::ok), Some(4));
//! ```

use super::{Job, Scheduler, SchedulerRef};
use crate::config::LabConfig;
use crate::error::{Error, Result};
use crossbeam_queue::SegQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A scheduler whose queue is drained only when the caller asks.
#[derive(Debug, Clone, Default)]
pub struct LabScheduler {
    shared: Arc<LabQueue>,
}

#[derive(Default)]
struct LabQueue {
    jobs: SegQueue<Job>,
    deferred: AtomicU64,
    executed: AtomicU64,
    config: LabConfig,
}

impl std::fmt::Debug for LabQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabQueue")
            .field("pending", &self.jobs.len())
            .field("deferred", &self.deferred.load(Ordering::Relaxed))
            .field("executed", &self.executed.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish()
    }
}

impl Scheduler for LabQueue {
    fn defer(&self, job: Job) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
        self.jobs.push(job);
    }
}

impl LabScheduler {
    /// Creates a lab scheduler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LabConfig::default())
    }

    /// Creates a lab scheduler with an explicit configuration.
    #[must_use]
    pub fn with_config(config: LabConfig) -> Self {
        Self {
            shared: Arc::new(LabQueue {
                config,
                ..LabQueue::default()
            }),
        }
    }

    /// Returns a handle promises can be created with.
    #[must_use]
    pub fn handle(&self) -> SchedulerRef {
        self.shared.clone()
    }

    /// Returns the scheduler configuration.
    #[must_use]
    pub fn config(&self) -> LabConfig {
        self.shared.config
    }

    /// Runs the oldest queued job. Returns `false` if the queue was empty.
    pub fn step(&self) -> bool {
        let Some(job) = self.shared.jobs.pop() else {
            return false;
        };
        self.shared.executed.fetch_add(1, Ordering::Relaxed);
        job();
        true
    }

    /// Runs jobs until the queue is empty, including jobs deferred by the
    /// jobs being run. Returns the number of jobs executed.
    ///
    /// Fails with [`Error::StepLimit`] if the configured limit is reached
    /// while work remains, which usually means a chain keeps re-deferring.
    pub fn run_until_idle(&self) -> Result<u64> {
        let mut steps = 0_u64;
        loop {
            if let Some(limit) = self.shared.config.max_steps {
                if steps >= limit && !self.is_idle() {
                    warn!(limit, pending = self.pending(), "lab scheduler hit step limit");
                    return Err(Error::StepLimit { limit });
                }
            }
            if !self.step() {
                trace!(steps, "lab scheduler idle");
                return Ok(steps);
            }
            steps += 1;
        }
    }

    /// Number of jobs waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.jobs.len()
    }

    /// Returns `true` if no jobs are waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.jobs.is_empty()
    }

    /// Total jobs ever deferred on this scheduler.
    #[must_use]
    pub fn deferred(&self) -> u64 {
        self.shared.deferred.load(Ordering::Relaxed)
    }

    /// Total jobs executed so far.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.shared.executed.load(Ordering::Relaxed)
    }
}

impl Scheduler for LabScheduler {
    fn defer(&self, job: Job) {
        self.shared.defer(job);
    }
}
