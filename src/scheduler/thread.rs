//! Background-thread scheduler.
//!
//! A [`ThreadScheduler`] owns one worker thread that pops deferred jobs off a
//! FIFO queue and runs them one at a time. Because there is a single worker,
//! every promise bound to it observes run-to-completion semantics per job,
//! even when `resolve`/`then` are called from other threads.

use super::{Job, Scheduler, SchedulerRef};
use crate::config::ThreadSchedulerConfig;
use crate::error::{Result, panic_message};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A scheduler backed by a dedicated worker thread.
///
/// Dropping the scheduler (or calling [`shutdown`](Self::shutdown)) lets the
/// worker finish every job already queued, then joins it. Jobs deferred
/// after shutdown are dropped.
#[derive(Debug)]
pub struct ThreadScheduler {
    shared: Arc<WorkerQueue>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: ThreadSchedulerConfig,
}

#[derive(Default)]
struct WorkerQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

impl std::fmt::Debug for WorkerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkerQueue")
            .field("pending", &state.jobs.len())
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

impl Scheduler for WorkerQueue {
    fn defer(&self, job: Job) {
        let mut state = self.state.lock();
        if state.shutdown {
            drop(state);
            warn!("job deferred after scheduler shutdown; dropping it");
            return;
        }
        state.jobs.push_back(job);
        drop(state);
        self.ready.notify_one();
    }
}

impl WorkerQueue {
    fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.shutdown {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    fn run(&self) {
        debug!("scheduler worker started");
        while let Some(job) = self.next_job() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                warn!(
                    message = %panic_message(payload.as_ref()),
                    "scheduled job panicked"
                );
                drop(payload);
            }
        }
        debug!("scheduler worker stopped");
    }
}

impl ThreadScheduler {
    /// Starts a scheduler with the default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Returns a builder for configuring the worker thread.
    #[must_use]
    pub fn builder() -> ThreadSchedulerBuilder {
        ThreadSchedulerBuilder::new()
    }

    fn start(config: ThreadSchedulerConfig) -> Result<Self> {
        let shared = Arc::new(WorkerQueue::default());
        let mut builder = thread::Builder::new().name(config.thread_name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }
        let worker_queue = Arc::clone(&shared);
        let handle = builder.spawn(move || worker_queue.run())?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(handle)),
            config,
        })
    }

    /// Returns a handle promises can be created with.
    #[must_use]
    pub fn handle(&self) -> SchedulerRef {
        self.shared.clone()
    }

    /// Returns the worker configuration.
    #[must_use]
    pub fn config(&self) -> &ThreadSchedulerConfig {
        &self.config
    }

    /// Number of jobs waiting for the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Stops accepting jobs, lets the worker drain what is queued, and joins it.
    ///
    /// Idempotent. When called from a job on this scheduler's own worker
    /// (including by dropping the last handle there), the worker is detached
    /// instead of joined; it still drains the queue before exiting.
    pub fn shutdown(&self) {
        self.shared.state.lock().shutdown = true;
        self.shared.ready.notify_all();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                debug!("scheduler shut down from its own worker; detaching");
                return;
            }
            if handle.join().is_err() {
                warn!("scheduler worker exited with a panic");
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn defer(&self, job: Job) {
        self.shared.defer(job);
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builder for [`ThreadScheduler`].
#[derive(Debug, Clone, Default)]
pub struct ThreadSchedulerBuilder {
    config: ThreadSchedulerConfig,
}

impl ThreadSchedulerBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from an existing configuration.
    #[must_use]
    pub fn from_config(config: ThreadSchedulerConfig) -> Self {
        Self { config }
    }

    /// Sets the worker thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Sets the worker thread stack size in bytes.
    #[must_use]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Spawns the worker thread.
    pub fn build(self) -> Result<ThreadScheduler> {
        ThreadScheduler::start(self.config)
    }
}
