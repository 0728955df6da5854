//! Per-identifier ledger of admitted request timestamps.

use std::collections::VecDeque;
use std::time::Duration;

/// Ordered record of admitted request times for one identifier.
///
/// Timestamps are offsets from the limiter's clock epoch and are kept
/// oldest first. Entries never decrease in time.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    entries: VecDeque<Duration>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry strictly older than `now - window`.
    ///
    /// Entries are non-decreasing, so this is a prefix trim that stops at the
    /// first entry still inside the window. Returns the number of entries removed.
    pub fn evict(&mut self, now: Duration, window: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(window) else {
            return 0;
        };

        let mut removed = 0;
        while self.entries.front().is_some_and(|&t| t < cutoff) {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Count entries at or after `cutoff`, scanning from the newest.
    pub fn count_since(&self, cutoff: Duration) -> usize {
        self.entries
            .iter()
            .rev()
            .take_while(|&&t| t >= cutoff)
            .count()
    }

    /// Append an admitted timestamp.
    ///
    /// A timestamp earlier than the newest entry is recorded at the newest
    /// entry's time so ordering holds when clock reads race.
    pub fn record(&mut self, at: Duration) {
        let at = match self.newest() {
            Some(newest) if at < newest => newest,
            _ => at,
        };
        self.entries.push_back(at);
    }

    /// The most recently admitted timestamp.
    pub fn newest(&self) -> Option<Duration> {
        self.entries.back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether nothing in this ledger can count toward a future evaluation.
    pub fn is_idle(&self, now: Duration, window: Duration) -> bool {
        match (self.newest(), now.checked_sub(window)) {
            (None, _) => true,
            (Some(newest), Some(cutoff)) => newest < cutoff,
            (Some(_), None) => false,
        }
    }
}
