//! Scheduler configuration.
//!
//! Both configs are plain values with builder-style setters. With the
//! `config-file` feature they can also be loaded from TOML:
//!
//! ```toml
//! thread_name = "promise-worker"
//! stack_size = 262144
//! ```

/// Default name of the [`ThreadScheduler`](crate::ThreadScheduler) worker.
pub const DEFAULT_THREAD_NAME: &str = "thenable-scheduler";

/// Default number of jobs a lab run may execute before giving up.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Configuration for the deterministic [`LabScheduler`](crate::LabScheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct LabConfig {
    /// Maximum jobs `run_until_idle` executes; `None` means unbounded.
    pub max_steps: Option<u64>,
}

impl LabConfig {
    /// Creates the default lab configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }

    /// Sets the step limit.
    #[must_use]
    pub const fn max_steps(mut self, limit: u64) -> Self {
        self.max_steps = Some(limit);
        self
    }

    /// Removes the step limit.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.max_steps = None;
        self
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the [`ThreadScheduler`](crate::ThreadScheduler) worker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct ThreadSchedulerConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Stack size of the worker thread in bytes; platform default if unset.
    pub stack_size: Option<usize>,
}

impl Default for ThreadSchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

/// Errors from loading configuration files.
#[cfg(feature = "config-file")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed into a config.
    #[error("invalid scheduler config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(feature = "config-file")]
impl LabConfig {
    /// Parses a lab config from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}

#[cfg(feature = "config-file")]
impl ThreadSchedulerConfig {
    /// Parses a thread scheduler config from a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}
