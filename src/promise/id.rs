//! Promise identifiers.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for a promise.
///
/// Identifiers appear in logs and `Debug` output and let the adoption path
/// detect a promise being asked to follow itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromiseId(u64);

impl PromiseId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates an identifier from a raw value. Intended for tests and logs.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promise#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = PromiseId::next();
        let b = PromiseId::next();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn display_format() {
        assert_eq!(PromiseId::from_raw(12).to_string(), "promise#12");
        assert_eq!(PromiseId::from_raw(12).as_u64(), 12);
    }
}
