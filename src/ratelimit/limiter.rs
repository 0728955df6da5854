//! Core rate limiter implementation.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, MonotonicClock};
use super::evaluator::{self, Limits, Verdict};
use super::ledger::Ledger;

/// A ledger plus the flag set when the reaper unlinks it from the map.
#[derive(Debug, Default)]
struct LedgerSlot {
    ledger: Ledger,
    retired: bool,
}

/// The rate limiter service that owns every identifier's ledger.
///
/// Each identifier's ledger sits behind its own mutex, so evaluations for the
/// same identifier are serialized while unrelated identifiers never contend
/// beyond the brief map lookup. This struct is thread-safe and can be shared
/// across tasks.
pub struct RateLimiter {
    /// Ledgers indexed by identifier
    ledgers: DashMap<String, Arc<Mutex<LedgerSlot>>>,
    /// Thresholds applied to every identifier
    limits: Limits,
    /// Time source used by [`RateLimiter::check`]
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter driven by a monotonic clock.
    pub fn new(limits: Limits) -> Self {
        Self::with_clock(limits, Arc::new(MonotonicClock::new()))
    }

    /// Create a rate limiter driven by the given clock.
    pub fn with_clock(limits: Limits, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledgers: DashMap::new(),
            limits,
            clock,
        }
    }

    /// Evaluate one request for `identifier` at time `now`.
    ///
    /// Evicts stale entries, applies the burst and sustained thresholds, and
    /// records `now` only when the request is admitted. `now` must not
    /// decrease across calls.
    pub fn evaluate(&self, identifier: &str, now: Duration) -> Verdict {
        self.evaluate_with(identifier, || now)
    }

    /// Evaluate one request for `identifier` at the limiter clock's current time.
    ///
    /// The clock is read while the identifier's ledger is held, so concurrent
    /// checks for one identifier observe increasing times.
    pub fn check(&self, identifier: &str) -> Verdict {
        self.evaluate_with(identifier, || self.clock.now())
    }

    fn evaluate_with<F>(&self, identifier: &str, read_clock: F) -> Verdict
    where
        F: Fn() -> Duration,
    {
        loop {
            let slot = self.slot(identifier);
            let mut slot = slot.lock();

            // Unlinked by the reaper after we fetched it; fetch again.
            if slot.retired {
                continue;
            }

            let now = read_clock();
            let evicted = slot.ledger.evict(now, self.limits.window);
            let verdict = evaluator::evaluate(&slot.ledger, now, &self.limits);

            if verdict.admitted {
                slot.ledger.record(now);
            } else {
                debug!(
                    identifier = %identifier,
                    reason = %verdict.reason,
                    burst_count = verdict.burst_count,
                    window_count = verdict.window_count,
                    "Rate limit exceeded"
                );
            }

            trace!(
                identifier = %identifier,
                now = ?now,
                evicted = evicted,
                admitted = verdict.admitted,
                "Evaluated request"
            );

            return verdict;
        }
    }

    /// Fetch the ledger slot for `identifier`, creating it on first sight.
    ///
    /// The map shard lock is released before the caller locks the slot.
    fn slot(&self, identifier: &str) -> Arc<Mutex<LedgerSlot>> {
        if let Some(slot) = self.ledgers.get(identifier) {
            return Arc::clone(slot.value());
        }

        let entry = self.ledgers.entry(identifier.to_string()).or_insert_with(|| {
            debug!(identifier = %identifier, "Creating new ledger");
            Arc::default()
        });
        Arc::clone(entry.value())
    }

    /// Drop every ledger with nothing left inside the window at `now`.
    ///
    /// Ledgers locked by an in-flight evaluation are kept. Returns the number
    /// of ledgers removed.
    pub fn purge_idle(&self, now: Duration) -> usize {
        let window = self.limits.window;
        let mut removed = 0;

        self.ledgers.retain(|_, slot| match slot.try_lock() {
            Some(mut slot) if slot.ledger.is_idle(now, window) => {
                slot.retired = true;
                removed += 1;
                false
            }
            _ => true,
        });

        removed
    }

    /// Purge idle ledgers at the limiter clock's current time.
    pub fn purge_idle_now(&self) -> usize {
        self.purge_idle(self.clock.now())
    }

    /// Number of admitted timestamps currently held for `identifier`.
    ///
    /// Returns `None` if the identifier has no ledger.
    pub fn ledger_len(&self, identifier: &str) -> Option<usize> {
        let slot = self.ledgers.get(identifier).map(|s| Arc::clone(s.value()))?;
        let len = slot.lock().ledger.len();
        Some(len)
    }

    /// Number of identifiers with a ledger.
    pub fn identifier_count(&self) -> usize {
        self.ledgers.len()
    }

    /// The thresholds this limiter applies.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The current time according to the limiter clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Clear all ledgers.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.ledgers.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
