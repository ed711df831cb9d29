//! Sliding Window Event Log
//!
//! A single fixed-duration, fixed-capacity window over admission timestamps.
//! Entries are kept oldest first and expire lazily when `prune` is called.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Which of the two windows a log belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Short window (one hour by default)
    Short,
    /// Long window (one day by default)
    Long,
}

impl WindowKind {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Short => "short",
            WindowKind::Long => "long",
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdmissionTicket(pub(crate) u64);

impl AdmissionTicket {
    /// Raw ticket number
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AdmissionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One logged admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    pub ticket: AdmissionTicket,
    pub at: Instant,
}

/// Point-in-time view of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStatus {
    /// Window identity
    pub window: WindowKind,

    /// Admissions currently counted
    pub count: usize,

    /// Maximum admissions
    pub capacity: usize,

    /// Window length in seconds
    pub duration_secs: u64,

    /// Seconds until a slot frees (0 when one is free)
    pub next_slot_secs: f64,
}

impl WindowStatus {
    /// Usage as a percentage of capacity
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity > 0 {
            (self.count as f64 / self.capacity as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Sliding window log
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    kind: WindowKind,
    capacity: usize,
    duration: Duration,
    entries: VecDeque<WindowEntry>,
}

impl SlidingWindow {
    /// Create an empty window
    pub fn new(kind: WindowKind, capacity: u32, duration: Duration) -> Self {
        Self {
            kind,
            capacity: capacity as usize,
            duration,
            entries: VecDeque::new(),
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of logged entries (call `prune` first for an exact count)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether no further admission fits
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Oldest logged entry
    pub fn oldest(&self) -> Option<&WindowEntry> {
        self.entries.front()
    }

    /// Newest logged entry
    pub fn newest(&self) -> Option<&WindowEntry> {
        self.entries.back()
    }

    /// Logged entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    /// Drop every entry that has fallen out of the window at `now`
    ///
    /// An entry admitted at `t` stops counting at `t + duration`. A clock
    /// reading earlier than an entry never expires it.
    pub fn prune(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.at) >= self.duration {
                self.entries.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    /// Append an entry; timestamps must not go backwards
    pub fn push(&mut self, entry: WindowEntry) {
        debug_assert!(
            self.entries.back().map_or(true, |last| last.at <= entry.at),
            "window entries must stay sorted"
        );
        self.entries.push_back(entry);
    }

    /// Remove the newest entry
    pub fn pop_newest(&mut self) -> Option<WindowEntry> {
        self.entries.pop_back()
    }

    /// Remove the entry recorded for `ticket`
    pub fn remove(&mut self, ticket: AdmissionTicket) -> Option<WindowEntry> {
        let index = self.entries.iter().rposition(|e| e.ticket == ticket)?;
        self.entries.remove(index)
    }

    /// Time until the next slot frees, zero when one is already free
    ///
    /// Saturates at `Duration::MAX` when the expiry lies beyond the clock's range.
    pub fn time_until_slot(&self, now: Instant) -> Duration {
        if !self.is_full() {
            return Duration::ZERO;
        }

        // The slot frees when the entry `capacity` places from the end expires
        let blocking = &self.entries[self.entries.len() - self.capacity];
        blocking
            .at
            .checked_add(self.duration)
            .map_or(Duration::MAX, |free_at| free_at.saturating_duration_since(now))
    }

    /// Snapshot of this window at `now`
    pub fn status(&self, now: Instant) -> WindowStatus {
        WindowStatus {
            window: self.kind,
            count: self.len(),
            capacity: self.capacity,
            duration_secs: self.duration.as_secs(),
            next_slot_secs: self.time_until_slot(now).as_secs_f64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, at: Instant) -> WindowEntry {
        WindowEntry {
            ticket: AdmissionTicket(id),
            at,
        }
    }

    #[test]
    fn test_window_creation() {
        let window = SlidingWindow::new(WindowKind::Short, 8, Duration::from_secs(3600));
        assert_eq!(window.capacity(), 8);
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.kind().as_str(), "short");
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Short, 5, Duration::from_secs(60));
        window.push(entry(1, base));
        window.push(entry(2, base + Duration::from_secs(30)));

        assert_eq!(window.prune(base + Duration::from_secs(59)), 0);
        assert_eq!(window.len(), 2);

        // Expires exactly one duration after admission
        assert_eq!(window.prune(base + Duration::from_secs(60)), 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window.oldest().unwrap().ticket, AdmissionTicket(2));
    }

    #[test]
    fn test_prune_ignores_clock_regression() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Long, 5, Duration::from_secs(60));
        window.push(entry(1, base + Duration::from_secs(10)));

        assert_eq!(window.prune(base), 0);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_time_until_slot() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Short, 2, Duration::from_secs(60));
        assert_eq!(window.time_until_slot(base), Duration::ZERO);

        window.push(entry(1, base));
        window.push(entry(2, base + Duration::from_secs(10)));
        assert!(window.is_full());

        let wait = window.time_until_slot(base + Duration::from_secs(10));
        assert_eq!(wait, Duration::from_secs(50));

        // Past the expiry the wait saturates at zero
        let wait = window.time_until_slot(base + Duration::from_secs(90));
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn test_time_until_slot_saturates_on_huge_duration() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Long, 1, Duration::from_secs(u64::MAX));
        window.push(entry(1, base));

        assert_eq!(window.time_until_slot(base), Duration::MAX);
        assert!(window.status(base).next_slot_secs > 0.0);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Short, u32::MAX, Duration::from_secs(60));
        assert_eq!(window.capacity(), u32::MAX as usize);

        window.push(entry(1, base));
        assert!(!window.is_full());
        assert_eq!(window.time_until_slot(base), Duration::ZERO);
    }

    #[test]
    fn test_remove_by_ticket() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Short, 3, Duration::from_secs(60));
        window.push(entry(1, base));
        window.push(entry(2, base));
        window.push(entry(3, base));

        assert_eq!(window.remove(AdmissionTicket(2)).unwrap().ticket, AdmissionTicket(2));
        assert!(window.remove(AdmissionTicket(2)).is_none());
        let tickets: Vec<_> = window.entries().map(|e| e.ticket.id()).collect();
        assert_eq!(tickets, vec![1, 3]);
    }

    #[test]
    fn test_pop_newest_on_empty() {
        let mut window = SlidingWindow::new(WindowKind::Short, 3, Duration::from_secs(60));
        assert!(window.pop_newest().is_none());
        assert!(window.is_empty());
    }

    #[test]
    fn test_status_snapshot() {
        let base = Instant::now();
        let mut window = SlidingWindow::new(WindowKind::Long, 4, Duration::from_secs(600));
        window.push(entry(1, base));

        let status = window.status(base);
        assert_eq!(status.window, WindowKind::Long);
        assert_eq!(status.count, 1);
        assert_eq!(status.capacity, 4);
        assert_eq!(status.duration_secs, 600);
        assert_eq!(status.next_slot_secs, 0.0);
        assert_eq!(status.utilization_percent(), 25.0);
    }
}
