//! Admission Error Types

use std::time::Duration;

/// Rejected admission configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A capacity or duration was zero
    #[error("Invalid admission configuration: {field} must be > 0")]
    NonPositive { field: &'static str },
}

/// Conditions that end an admission request without admitting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// Shutdown was signalled while the caller was waiting
    #[error("Admission cancelled by shutdown")]
    Cancelled,

    /// The caller waited longer than the configured ceiling
    #[error("Rate limit wait exceeded {max_wait:?} (waited {waited:?})")]
    RateLimitTimeout { waited: Duration, max_wait: Duration },
}

impl AdmissionError {
    /// Whether the caller may reasonably try again later
    pub fn is_transient(&self) -> bool {
        matches!(self, AdmissionError::RateLimitTimeout { .. })
    }
}
