//! Dual-Window Admission Controller
//!
//! Callers ask for admission before a rate-limited action. The controller
//! admits at once when both windows have room, otherwise it sleeps until the
//! stricter window frees a slot and checks again. A failed action is undone
//! with a rollback so it stops counting against the limits.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::AdmissionConfig;
use super::error::{AdmissionError, ConfigurationError};
use super::ledger::{Decision, WindowCounts, WindowLedger};
use super::window::{AdmissionTicket, WindowStatus};
use crate::metrics;

/// Receipt for a granted admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Identifier usable with [`AdmissionController::rollback`]
    pub ticket: AdmissionTicket,

    /// Timestamp recorded in both windows
    pub admitted_at: Instant,

    /// Total time spent blocked before admission
    pub waited: Duration,
}

/// Snapshot of both windows
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionStatus {
    /// Wall-clock time the snapshot was taken
    pub taken_at: chrono::DateTime<chrono::Utc>,
    pub short: WindowStatus,
    pub long: WindowStatus,
}

impl AdmissionStatus {
    /// Whether a request issued now would be admitted without waiting
    pub fn has_free_slot(&self) -> bool {
        self.short.count < self.short.capacity && self.long.count < self.long.capacity
    }
}

/// Admission controller
///
/// Share it between tasks with an `Arc`. Admission is intended for a single
/// consumer that requests, acts, and then rolls back on failure before
/// requesting again. Concurrent callers never exceed capacity, but the order
/// in which they are admitted is unspecified.
#[derive(Debug)]
pub struct AdmissionController {
    config: AdmissionConfig,
    ledger: Mutex<WindowLedger>,
    released: Notify,
    shutdown: CancellationToken,
}

impl AdmissionController {
    /// Create a controller with its own shutdown token
    pub fn new(config: AdmissionConfig) -> Result<Self, ConfigurationError> {
        Self::with_shutdown(config, CancellationToken::new())
    }

    /// Create a controller whose waits end when `shutdown` is cancelled
    pub fn with_shutdown(
        config: AdmissionConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        if config.verbose {
            info!(
                short_capacity = config.short_window_capacity,
                short_window_secs = config.short_window_secs,
                long_capacity = config.long_window_capacity,
                long_window_secs = config.long_window_secs,
                max_wait_secs = ?config.max_wait_secs,
                "Admission controller initialized"
            );
        }

        Ok(Self {
            ledger: Mutex::new(WindowLedger::new(&config)),
            released: Notify::new(),
            config,
            shutdown,
        })
    }

    /// Controller configuration
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Token that cancels pending waits
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until both windows have a free slot, then record an admission
    ///
    /// # Errors
    ///
    /// * [`AdmissionError::Cancelled`] if the shutdown token fires first
    /// * [`AdmissionError::RateLimitTimeout`] if a wait ceiling is configured
    ///   and reached before a slot frees
    pub async fn request_admission(&self) -> Result<Admission, AdmissionError> {
        let started = Instant::now();
        // A ceiling past the clock's range is no ceiling at all
        let deadline = self
            .config
            .max_wait_duration()
            .and_then(|max| started.checked_add(max));

        loop {
            if self.shutdown.is_cancelled() {
                metrics::ADMISSIONS_CANCELLED_TOTAL.inc();
                return Err(AdmissionError::Cancelled);
            }

            // Registered before the check so a rollback racing the decision still wakes us
            let released = self.released.notified();
            // Lock covers the clock read, prune, check and append; never held while sleeping
            let (now, decision, counts) = {
                let mut ledger = self.ledger.lock().await;
                let now = Instant::now();
                let decision = ledger.try_admit(now);
                (now, decision, ledger.counts())
            };
            record_usage(&counts);

            let wait = match decision {
                Decision::Admitted(entry) => {
                    let waited = entry.at.saturating_duration_since(started);
                    metrics::ADMISSIONS_TOTAL.inc();
                    metrics::ADMISSION_WAIT_SECONDS.observe(waited.as_secs_f64());
                    self.log_admitted(entry.ticket, &counts, waited);
                    return Ok(Admission {
                        ticket: entry.ticket,
                        admitted_at: entry.at,
                        waited,
                    });
                }
                Decision::Wait(wait) => wait.max(self.config.min_wait_duration()),
            };

            let mut wake_at = wake_time(now, wait);
            if let Some(deadline) = deadline {
                if now >= deadline {
                    let waited = now.saturating_duration_since(started);
                    let max_wait = deadline.saturating_duration_since(started);
                    metrics::ADMISSION_TIMEOUTS_TOTAL.inc();
                    if self.config.verbose {
                        info!(waited_ms = waited.as_millis() as u64, "Admission wait ceiling reached");
                    }
                    return Err(AdmissionError::RateLimitTimeout { waited, max_wait });
                }
                wake_at = wake_at.min(deadline);
            }

            metrics::ADMISSION_WAITS_TOTAL.inc();
            self.log_blocked(&counts, wait);

            tokio::select! {
                _ = sleep_until(wake_at) => {}
                _ = released => {}
                _ = self.shutdown.cancelled() => {
                    metrics::ADMISSIONS_CANCELLED_TOTAL.inc();
                    if self.config.verbose {
                        info!("Admission wait cancelled by shutdown");
                    }
                    return Err(AdmissionError::Cancelled);
                }
            }
        }
    }

    /// Undo the most recent admission in both windows
    ///
    /// Only correct when it directly follows the admission it undoes. A call
    /// with nothing logged does nothing.
    pub async fn rollback_last_admission(&self) -> Option<AdmissionTicket> {
        let (removed, counts) = {
            let mut ledger = self.ledger.lock().await;
            let removed = ledger.rollback_last();
            (removed, ledger.counts())
        };
        self.after_rollback(removed.map(|e| e.ticket), &counts);
        removed.map(|e| e.ticket)
    }

    /// Undo the admission identified by `ticket`
    ///
    /// Returns `false` when the entry already expired or was rolled back.
    pub async fn rollback(&self, ticket: AdmissionTicket) -> bool {
        let (removed, counts) = {
            let mut ledger = self.ledger.lock().await;
            let removed = ledger.rollback(ticket);
            (removed, ledger.counts())
        };
        self.after_rollback(removed.map(|e| e.ticket), &counts);
        removed.is_some()
    }

    /// Current usage of both windows
    pub async fn status(&self) -> AdmissionStatus {
        let (short, long) = self.ledger.lock().await.status(Instant::now());
        AdmissionStatus {
            taken_at: chrono::Utc::now(),
            short,
            long,
        }
    }

    fn after_rollback(&self, removed: Option<AdmissionTicket>, counts: &WindowCounts) {
        record_usage(counts);
        match removed {
            Some(ticket) => {
                self.released.notify_waiters();
                metrics::ADMISSION_ROLLBACKS_TOTAL.inc();
                if self.config.verbose {
                    info!(
                        timestamp = %chrono::Utc::now().to_rfc3339(),
                        ticket = %ticket,
                        short_count = counts.short,
                        short_capacity = counts.short_capacity,
                        long_count = counts.long,
                        long_capacity = counts.long_capacity,
                        "Admission rolled back"
                    );
                }
            }
            None => debug!("Rollback requested with nothing to undo"),
        }
    }

    fn log_admitted(&self, ticket: AdmissionTicket, counts: &WindowCounts, waited: Duration) {
        if !self.config.verbose {
            return;
        }
        info!(
            timestamp = %chrono::Utc::now().to_rfc3339(),
            ticket = %ticket,
            short_count = counts.short,
            short_capacity = counts.short_capacity,
            long_count = counts.long,
            long_capacity = counts.long_capacity,
            waited_ms = waited.as_millis() as u64,
            "Admission granted"
        );
    }

    fn log_blocked(&self, counts: &WindowCounts, wait: Duration) {
        if !self.config.verbose {
            return;
        }
        info!(
            timestamp = %chrono::Utc::now().to_rfc3339(),
            short_count = counts.short,
            short_capacity = counts.short_capacity,
            long_count = counts.long,
            long_capacity = counts.long_capacity,
            wait_ms = wait.as_millis() as u64,
            "Rate limit reached, waiting for a free slot"
        );
    }
}

/// Longest single sleep; the loop re-checks after it
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn wake_time(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait.min(FAR_FUTURE))
        .or_else(|| now.checked_add(Duration::from_secs(86400)))
        .unwrap_or(now)
}

fn record_usage(counts: &WindowCounts) {
    metrics::WINDOW_USAGE
        .with_label_values(&["short"])
        .set(counts.short as i64);
    metrics::WINDOW_USAGE
        .with_label_values(&["long"])
        .set(counts.long as i64);
}
