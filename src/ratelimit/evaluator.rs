//! Two-tier admission evaluation over an evicted ledger.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::ledger::Ledger;
use crate::error::{Result, TurnstileError};

/// Default sustained-rate limit (admitted requests per window).
pub const DEFAULT_RATE_LIMIT: usize = 40;
/// Default burst limit (admitted requests per burst window).
pub const DEFAULT_BURST_LIMIT: usize = 11;
/// Default sustained-rate window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default burst window.
pub const DEFAULT_BURST_WINDOW: Duration = Duration::from_secs(1);

/// Thresholds applied by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Admitted requests allowed within `window`
    pub rate_limit: usize,
    /// Admitted requests allowed within `burst_window`
    pub burst_limit: usize,
    /// Sustained-rate window, also the ledger retention horizon
    pub window: Duration,
    /// Burst window
    pub burst_window: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            burst_limit: DEFAULT_BURST_LIMIT,
            window: DEFAULT_WINDOW,
            burst_window: DEFAULT_BURST_WINDOW,
        }
    }
}

impl Limits {
    /// Check that the thresholds describe a usable limiter.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit == 0 {
            return Err(invalid("rate_limit must be greater than zero"));
        }
        if self.burst_limit == 0 {
            return Err(invalid("burst_limit must be greater than zero"));
        }
        if self.window.is_zero() || self.burst_window.is_zero() {
            return Err(invalid("windows must be longer than zero"));
        }
        if self.burst_window > self.window {
            return Err(TurnstileError::Config(format!(
                "burst window ({:?}) must not exceed the rate window ({:?})",
                self.burst_window, self.window
            )));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> TurnstileError {
    TurnstileError::Config(message.to_string())
}

/// Why a request was admitted or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    Ok,
    RateExceeded,
    BurstExceeded,
}

impl Reason {
    /// Machine-readable reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::RateExceeded => "rate-exceeded",
            Reason::BurstExceeded => "burst-exceeded",
        }
    }

    /// Human-readable message for the configured limits,
    /// e.g. "Burst limit exceeded (11 per second)".
    pub fn describe(&self, limits: &Limits) -> String {
        match self {
            Reason::Ok => "Request admitted".to_string(),
            Reason::RateExceeded => format!(
                "Rate limit exceeded ({} per {})",
                limits.rate_limit,
                unit_name(limits.window)
            ),
            Reason::BurstExceeded => format!(
                "Burst limit exceeded ({} per {})",
                limits.burst_limit,
                unit_name(limits.burst_window)
            ),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unit_name(window: Duration) -> String {
    match window.as_secs_f64() {
        w if w == 1.0 => "second".to_string(),
        w if w == 60.0 => "minute".to_string(),
        w if w == 3600.0 => "hour".to_string(),
        w if w == 86400.0 => "day".to_string(),
        w => format!("{} seconds", w),
    }
}

/// Outcome of one admission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub admitted: bool,
    pub reason: Reason,
    /// Admitted requests already inside the burst window
    pub burst_count: usize,
    /// Admitted requests already inside the sustained window
    pub window_count: usize,
}

impl Verdict {
    fn new(reason: Reason, burst_count: usize, window_count: usize) -> Self {
        Self {
            admitted: reason == Reason::Ok,
            reason,
            burst_count,
            window_count,
        }
    }
}

/// Decide whether one more request fits in `ledger` at `now`.
///
/// `ledger` must already be evicted against `limits.window`. The current
/// request is not counted, so exactly `burst_limit` requests fit in a burst
/// window and exactly `rate_limit` in the sustained window. Burst is checked
/// first.
pub fn evaluate(ledger: &Ledger, now: Duration, limits: &Limits) -> Verdict {
    let burst_cutoff = now.saturating_sub(limits.burst_window);
    let burst_count = ledger.count_since(burst_cutoff);
    let window_count = ledger.len();

    if burst_count >= limits.burst_limit {
        return Verdict::new(Reason::BurstExceeded, burst_count, window_count);
    }

    if window_count >= limits.rate_limit {
        return Verdict::new(Reason::RateExceeded, burst_count, window_count);
    }

    Verdict::new(Reason::Ok, burst_count, window_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn ledger_at(times: impl IntoIterator<Item = f64>) -> Ledger {
        let mut ledger = Ledger::new();
        for t in times {
            ledger.record(secs(t));
        }
        ledger
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.rate_limit, 40);
        assert_eq!(limits.burst_limit, 11);
        assert_eq!(limits.window, Duration::from_secs(60));
        assert_eq!(limits.burst_window, Duration::from_secs(1));
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let zero_rate = Limits { rate_limit: 0, ..Limits::default() };
        assert!(matches!(zero_rate.validate(), Err(TurnstileError::Config(_))));

        let zero_window = Limits { burst_window: Duration::ZERO, ..Limits::default() };
        assert!(zero_window.validate().is_err());

        let inverted = Limits {
            burst_window: Duration::from_secs(120),
            ..Limits::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_empty_ledger_admits() {
        let verdict = evaluate(&Ledger::new(), secs(0.0), &Limits::default());
        assert!(verdict.admitted);
        assert_eq!(verdict.reason, Reason::Ok);
        assert_eq!(verdict.burst_count, 0);
        assert_eq!(verdict.window_count, 0);
    }

    #[test]
    fn test_burst_boundary() {
        let limits = Limits::default();

        // Ten entries inside the last second: one more still fits.
        let ledger = ledger_at((0..10).map(|i| 10.0 + i as f64 * 0.05));
        assert!(evaluate(&ledger, secs(10.6), &limits).admitted);

        // Eleven entries inside the last second: rejected.
        let ledger = ledger_at((0..11).map(|i| 10.0 + i as f64 * 0.05));
        let verdict = evaluate(&ledger, secs(10.6), &limits);
        assert!(!verdict.admitted);
        assert_eq!(verdict.reason, Reason::BurstExceeded);
        assert_eq!(verdict.burst_count, 11);
    }

    #[test]
    fn test_burst_window_is_inclusive_of_cutoff() {
        let limits = Limits::default();
        let ledger = ledger_at(std::iter::repeat(4.0).take(11));

        assert_eq!(evaluate(&ledger, secs(5.0), &limits).reason, Reason::BurstExceeded);
        assert!(evaluate(&ledger, secs(5.5), &limits).admitted);
    }

    #[test]
    fn test_rate_boundary() {
        let limits = Limits::default();

        let ledger = ledger_at((0..39).map(|i| i as f64));
        assert!(evaluate(&ledger, secs(40.0), &limits).admitted);

        let ledger = ledger_at((0..40).map(|i| i as f64));
        let verdict = evaluate(&ledger, secs(40.0), &limits);
        assert!(!verdict.admitted);
        assert_eq!(verdict.reason, Reason::RateExceeded);
        assert_eq!(verdict.window_count, 40);
    }

    #[test]
    fn test_burst_checked_before_rate() {
        let limits = Limits::default();
        let mut times: Vec<f64> = (0..29).map(|i| i as f64).collect();
        times.extend((0..11).map(|i| 30.0 + i as f64 * 0.01));
        let ledger = ledger_at(times);

        let verdict = evaluate(&ledger, secs(30.5), &limits);
        assert_eq!(ledger.len(), 40);
        assert_eq!(verdict.reason, Reason::BurstExceeded);
    }

    #[test]
    fn test_reason_messages() {
        let limits = Limits::default();
        assert_eq!(
            Reason::BurstExceeded.describe(&limits),
            "Burst limit exceeded (11 per second)"
        );
        assert_eq!(
            Reason::RateExceeded.describe(&limits),
            "Rate limit exceeded (40 per minute)"
        );

        let custom = Limits { window: Duration::from_secs(90), ..limits };
        assert_eq!(
            Reason::RateExceeded.describe(&custom),
            "Rate limit exceeded (40 per 90 seconds)"
        );
    }

    #[test]
    fn test_reason_serialization() {
        assert_eq!(serde_json::to_string(&Reason::Ok).unwrap(), "\"ok\"");
        assert_eq!(
            serde_json::to_string(&Reason::RateExceeded).unwrap(),
            "\"rate-exceeded\""
        );
        assert_eq!(Reason::BurstExceeded.to_string(), "burst-exceeded");
    }
}
