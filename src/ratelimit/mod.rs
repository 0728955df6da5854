//! Rate limiting logic and state management.

mod clock;
mod evaluator;
mod ledger;
mod limiter;
mod reaper;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use evaluator::{evaluate, Limits, Reason, Verdict};
pub use ledger::Ledger;
pub use limiter::RateLimiter;
pub use reaper::spawn_reaper;
