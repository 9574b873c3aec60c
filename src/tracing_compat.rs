//! Optional tracing integration.
//!
//! With the `tracing-integration` feature enabled these macros forward to the
//! [`tracing`](https://docs.rs/tracing) crate. Without it they expand to an
//! empty block and their arguments are never evaluated, so logging costs
//! nothing in default builds.

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing-integration")]
        {
            ::tracing::trace!($($arg)*);
        }
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing-integration")]
        {
            ::tracing::debug!($($arg)*);
        }
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing-integration")]
        {
            ::tracing::warn!($($arg)*);
        }
    }};
}
