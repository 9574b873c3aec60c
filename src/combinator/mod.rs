//! Combinators over many promises.
//!
//! - [`all`](mod@all): wait for every input, in input order; first rejection wins
//! - [`any`](mod@any): settle with whichever input settles first
//!
//! Both settle their aggregate promise through the guarded
//! [`resolve`](crate::Promise::resolve)/[`reject`](crate::Promise::reject)
//! entry points, so the aggregate settles exactly once and later input
//! outcomes are discarded. Inputs are never cancelled.

pub mod all;
pub mod any;

pub use all::all;
pub use any::any;
