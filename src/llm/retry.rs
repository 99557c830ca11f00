//! Delay policy for the request executor: proactive pacing before each
//! attempt and exponential backoff with jitter between attempts.

use std::time::Duration;

use rand::Rng;

/// Doubling stops here so the multiplier cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Delay to wait after failed attempt `attempt` (1-based):
/// `base * 2^(attempt - 1) + U[0, max_jitter)`.
pub(crate) fn backoff_delay(base: Duration, attempt: u32, max_jitter: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    base.saturating_mul(1u32 << exponent)
        .saturating_add(jitter(max_jitter))
}

/// Random pre-request delay in `[min, max]`.
pub(crate) fn pacing_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..max)
}
