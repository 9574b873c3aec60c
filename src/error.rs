//! Error types.
//!
//! Two kinds of failure live here:
//!
//! - [`Error`]: failures raised by this crate itself (a panicking handler,
//!   a promise adopting its own outcome, a lab run that never went idle,
//!   a worker thread that could not be spawned).
//! - [`Reason`]: the opaque payload carried by a rejected promise. Callers
//!   pick whatever type they like for it; the crate never inspects it.
//!
//! An [`Error`] converts into a [`Reason`], so crate failures flow through
//! the same rejection path as caller-defined ones.

use crate::promise::PromiseId;
use core::fmt;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Failures produced by the crate itself.
#[derive(Debug, Error)]
pub enum Error {
    /// A handler panicked while a promise was draining its reactions.
    #[error("handler panicked: {message}")]
    HandlerPanicked {
        /// The panic message, or a placeholder for non-string payloads.
        message: String,
    },
    /// A promise was asked to adopt its own eventual outcome.
    #[error("promise {id} cannot adopt its own outcome")]
    SelfResolution {
        /// The promise that tried to follow itself.
        id: PromiseId,
    },
    /// A thenable panicked while a promise was subscribing to it.
    #[error("thenable panicked during adoption: {message}")]
    AdoptionPanicked {
        /// The panic message, or a placeholder for non-string payloads.
        message: String,
    },
    /// The lab scheduler ran more jobs than its configured limit.
    #[error("lab scheduler exceeded step limit of {limit}")]
    StepLimit {
        /// The configured step limit.
        limit: u64,
    },
    /// The scheduler worker thread could not be spawned.
    #[error("failed to spawn scheduler worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result type for crate operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The opaque failure payload of a rejected promise.
///
/// A `Reason` wraps any `Send + Sync + 'static` value behind an [`Arc`], so it
/// is cheap to clone when a rejection fans out to several reactions. Use
/// [`downcast_ref`](Self::downcast_ref) to recover the original value.
///
/// # Example
///
/// ```
/// use thenable::Reason;
///
/// let reason = Reason::new("boom");
/// assert_eq!(reason.downcast_ref::<&str>(), Some(&"boom"));
/// assert!(!reason.is::<String>());
/// ```
#[derive(Clone)]
pub struct Reason {
    payload: Arc<dyn Any + Send + Sync>,
}

impl Reason {
    /// Wraps an arbitrary value as a rejection reason.
    #[must_use]
    pub fn new<E>(payload: E) -> Self
    where
        E: Any + Send + Sync,
    {
        Self {
            payload: Arc::new(payload),
        }
    }

    /// Returns a reference to the payload if it has type `E`.
    #[must_use]
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Returns `true` if the payload has type `E`.
    #[must_use]
    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    /// Returns the payload as a crate [`Error`], if that is what it holds.
    #[must_use]
    pub fn as_error(&self) -> Option<&Error> {
        self.downcast_ref::<Error>()
    }

    /// Builds a reason from a caught panic payload.
    ///
    /// Panic payloads are only `Send`, so the message is extracted and the
    /// reason holds an [`Error::HandlerPanicked`].
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::new(Error::HandlerPanicked {
            message: panic_message(payload),
        })
    }

    fn describe(&self) -> Option<String> {
        if let Some(s) = self.downcast_ref::<&'static str>() {
            return Some((*s).to_string());
        }
        if let Some(s) = self.downcast_ref::<String>() {
            return Some(s.clone());
        }
        self.as_error().map(ToString::to_string)
    }
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(msg) => f.debug_tuple("Reason").field(&msg).finish(),
            None => f.write_str("Reason(<opaque>)"),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(msg) => write!(f, "{msg}"),
            None => f.write_str("opaque rejection reason"),
        }
    }
}

impl From<Error> for Reason {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}

impl From<&'static str> for Reason {
    fn from(msg: &'static str) -> Self {
        Self::new(msg)
    }
}

impl From<String> for Reason {
    fn from(msg: String) -> Self {
        Self::new(msg)
    }
}
