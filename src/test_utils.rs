//! Test helpers shared by unit and integration tests.
//!
//! Enabled for `cfg(test)` and by the `test-internals` feature.
//!
//! ```ignore
//! use thenable::test_utils::init_test_logging;
//!
//! #[test]
//! fn my_test() {
//!     init_test_logging();
//!     thenable::test_phase!("my_test");
//!     // ...
//!     thenable::test_complete!("my_test");
//! }
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;

#[doc(hidden)]
pub use tracing as __tracing;

static INIT: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `thenable=trace`.
/// Output goes through the test writer so it is captured per test.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("thenable=trace"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Logs the start of a test phase.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(test = %$name, "test phase start");
    };
}

/// Logs successful completion of a test.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        $crate::test_utils::__tracing::info!(test = %$name, "test complete");
    };
}

/// Asserts a condition, logging expected and actual values first.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {{
        let passed = $cond;
        let expected = &$expected;
        let actual = &$actual;
        $crate::test_utils::__tracing::debug!(
            passed,
            expected = ?expected,
            actual = ?actual,
            "{}",
            $msg
        );
        assert!(
            passed,
            "{}: expected {:?}, got {:?}",
            $msg,
            expected,
            actual
        );
    }};
}
