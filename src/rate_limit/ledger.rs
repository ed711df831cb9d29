//! Dual Window Ledger
//!
//! Holds the short and long window logs and mutates them together. Every
//! method takes the current time explicitly so the admission decision can be
//! evaluated without touching a clock.

use std::time::Duration;
use tokio::time::Instant;

use super::config::AdmissionConfig;
use super::window::{AdmissionTicket, SlidingWindow, WindowEntry, WindowKind, WindowStatus};

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A slot was free in both windows and has been recorded
    Admitted(WindowEntry),

    /// Both windows must be re-checked after this long
    Wait(Duration),
}

/// Entry counts after the last prune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounts {
    pub short: usize,
    pub short_capacity: usize,
    pub long: usize,
    pub long_capacity: usize,
}

/// Short and long window logs
#[derive(Debug, Clone)]
pub struct WindowLedger {
    short: SlidingWindow,
    long: SlidingWindow,
    next_ticket: u64,
}

impl WindowLedger {
    /// Create empty logs sized from the configuration
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            short: SlidingWindow::new(
                WindowKind::Short,
                config.short_window_capacity,
                config.short_window_duration(),
            ),
            long: SlidingWindow::new(
                WindowKind::Long,
                config.long_window_capacity,
                config.long_window_duration(),
            ),
            next_ticket: 1,
        }
    }

    /// Drop expired entries from both logs
    pub fn prune(&mut self, now: Instant) {
        self.short.prune(now);
        self.long.prune(now);
    }

    /// Prune, then admit at `now` or report how long to wait
    ///
    /// When both windows are full the wait is the later of the two expiries.
    pub fn try_admit(&mut self, now: Instant) -> Decision {
        self.prune(now);

        if !self.short.is_full() && !self.long.is_full() {
            let entry = WindowEntry {
                ticket: AdmissionTicket(self.next_ticket),
                at: now,
            };
            self.next_ticket += 1;
            self.short.push(entry);
            self.long.push(entry);
            return Decision::Admitted(entry);
        }

        let wait = self
            .short
            .time_until_slot(now)
            .max(self.long.time_until_slot(now));
        Decision::Wait(wait)
    }

    /// Remove the most recent admission from both logs
    ///
    /// Returns `None` when nothing is logged.
    pub fn rollback_last(&mut self) -> Option<WindowEntry> {
        // Newest ticket across both logs, so a window that already pruned
        // the entry cannot lose an older one instead
        let newest = match (self.short.newest(), self.long.newest()) {
            (Some(s), Some(l)) => s.ticket.max(l.ticket),
            (Some(s), None) => s.ticket,
            (None, Some(l)) => l.ticket,
            (None, None) => return None,
        };
        self.rollback(newest)
    }

    /// Remove the admission recorded for `ticket` from both logs
    pub fn rollback(&mut self, ticket: AdmissionTicket) -> Option<WindowEntry> {
        let short = self.short.remove(ticket);
        let long = self.long.remove(ticket);
        short.or(long)
    }

    /// Current entry counts (not pruned)
    pub fn counts(&self) -> WindowCounts {
        WindowCounts {
            short: self.short.len(),
            short_capacity: self.short.capacity(),
            long: self.long.len(),
            long_capacity: self.long.capacity(),
        }
    }

    /// Snapshot of both windows at `now`
    pub fn status(&mut self, now: Instant) -> (WindowStatus, WindowStatus) {
        self.prune(now);
        (self.short.status(now), self.long.status(now))
    }

    pub fn short(&self) -> &SlidingWindow {
        &self.short
    }

    pub fn long(&self) -> &SlidingWindow {
        &self.long
    }
}
