//! Thenable: write-once promises with scheduler-deferred continuations.
//!
//! # Overview
//!
//! A [`Promise`] is a container for a value or failure that becomes known at
//! some later time. Producers settle it once with [`Promise::resolve`] or
//! [`Promise::reject`]; consumers register continuations with
//! [`Promise::then`] and friends. Every continuation runs later, through an
//! injected [`Scheduler`], never inside the call that registered it or the
//! call that settled its source.
//!
//! # Core Guarantees
//!
//! - **Single settlement**: the first `resolve`/`reject` wins; later calls are silent no-ops
//! - **Deferred delivery**: handlers are only ever invoked from a scheduler job
//! - **Fault containment**: a failing or panicking handler rejects its own derived promise and nothing else
//! - **Adoption**: a handler may return any [`Thenable`], whose eventual outcome the derived promise mirrors
//! - **FIFO**: reactions on one promise fire in registration order
//!
//! # Module Structure
//!
//! - [`promise`]: The settlement state machine, chaining, and thenable adoption
//! - [`combinator`]: `all` and `any` aggregation over many promises
//! - [`scheduler`]: The deferred-call seam plus lab and thread-backed schedulers
//! - [`config`]: Scheduler configuration
//! - [`error`](mod@error): Crate errors and the opaque rejection [`Reason`]
//!
//! # Example
//!
//! ```
//! use thenable::{LabScheduler, Promise, Status};
//!
//! let lab = LabScheduler::new();
//! let source: Promise<u32> = Promise::new(lab.handle());
//! let doubled = source.map(|v| v * 2);
//!
//! source.resolve(21);
//! assert_eq!(doubled.status(), Status::Pending);
//!
//! lab.run_until_idle().expect("lab run");
//! assert_eq!(doubled.outcome().and_then(Result::ok), Some(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

#[macro_use]
mod tracing_compat;

pub mod combinator;
pub mod config;
pub mod error;
pub mod promise;
pub mod scheduler;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use combinator::{all, any};
pub use config::{LabConfig, ThreadSchedulerConfig};
#[cfg(feature = "config-file")]
pub use config::ConfigError;
pub use error::{Error, Reason, Result};
pub use promise::{Promise, PromiseFuture, PromiseId, Settle, Status, Step, Thenable};
pub use scheduler::{
    Job, LabScheduler, Scheduler, SchedulerRef, ThreadScheduler, ThreadSchedulerBuilder,
};
