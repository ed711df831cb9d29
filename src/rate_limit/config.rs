//! Admission Controller Configuration
//!
//! Capacities and durations for the short and long windows.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::ConfigurationError;

/// Default rate limits
pub const DEFAULT_SHORT_WINDOW_CAPACITY: u32 = 8; // comments per hour
pub const DEFAULT_SHORT_WINDOW_SECS: u64 = 3600;
pub const DEFAULT_LONG_WINDOW_CAPACITY: u32 = 50; // comments per day
pub const DEFAULT_LONG_WINDOW_SECS: u64 = 24 * 3600;
pub const DEFAULT_MIN_WAIT_MS: u64 = 10;

/// Admission controller configuration
///
/// Read once at startup; the controller keeps its own copy and never
/// changes it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum admissions inside the short window
    pub short_window_capacity: u32,

    /// Short window length in seconds
    pub short_window_secs: u64,

    /// Maximum admissions inside the long window
    pub long_window_capacity: u32,

    /// Long window length in seconds
    pub long_window_secs: u64,

    /// Log every admission decision and rollback
    pub verbose: bool,

    /// Give up waiting for a slot after this many seconds
    pub max_wait_secs: Option<u64>,

    /// Smallest sleep between re-checks, in milliseconds
    pub min_wait_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            short_window_capacity: DEFAULT_SHORT_WINDOW_CAPACITY,
            short_window_secs: DEFAULT_SHORT_WINDOW_SECS,
            long_window_capacity: DEFAULT_LONG_WINDOW_CAPACITY,
            long_window_secs: DEFAULT_LONG_WINDOW_SECS,
            verbose: false,
            max_wait_secs: None,
            min_wait_ms: DEFAULT_MIN_WAIT_MS,
        }
    }
}

impl AdmissionConfig {
    /// Create a configuration from the two (capacity, duration) pairs
    pub fn new(
        short_window_capacity: u32,
        short_window: Duration,
        long_window_capacity: u32,
        long_window: Duration,
    ) -> Self {
        Self {
            short_window_capacity,
            short_window_secs: short_window.as_secs(),
            long_window_capacity,
            long_window_secs: long_window.as_secs(),
            ..Self::default()
        }
    }

    /// Enable or disable decision logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set a ceiling on how long a single admission may wait
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait_secs = Some(max_wait.as_secs());
        self
    }

    /// Short window length
    pub fn short_window_duration(&self) -> Duration {
        Duration::from_secs(self.short_window_secs)
    }

    /// Long window length
    pub fn long_window_duration(&self) -> Duration {
        Duration::from_secs(self.long_window_secs)
    }

    /// Optional wait ceiling
    pub fn max_wait_duration(&self) -> Option<Duration> {
        self.max_wait_secs.map(Duration::from_secs)
    }

    /// Re-check epsilon used when a computed wait is zero
    pub fn min_wait_duration(&self) -> Duration {
        Duration::from_millis(self.min_wait_ms)
    }

    /// Check that every capacity and duration is positive
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let checks = [
            ("short_window_capacity", self.short_window_capacity as u64),
            ("short_window_secs", self.short_window_secs),
            ("long_window_capacity", self.long_window_capacity as u64),
            ("long_window_secs", self.long_window_secs),
            ("min_wait_ms", self.min_wait_ms),
        ];

        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigurationError::NonPositive { field });
            }
        }

        if self.max_wait_secs == Some(0) {
            return Err(ConfigurationError::NonPositive {
                field: "max_wait_secs",
            });
        }

        Ok(())
    }
}
