//! Exponential backoff shared by MCP reconnection and OAuth refresh retries.

use std::time::Duration;

/// An exponential backoff schedule: `base * factor^attempt`, capped, with
/// symmetric jitter applied.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Upper bound on the computed delay, before jitter.
    pub cap: Duration,
    /// Jitter fraction applied symmetrically (e.g. `0.1` = ±10%).
    pub jitter: f64,
}

impl RetryPolicy {
    /// The MCP reconnection policy from the component contract: base 1s,
    /// factor 2, cap 60s, ±10% jitter.
    #[must_use]
    pub const fn mcp_reconnect() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            cap: Duration::from_secs(60),
            jitter: 0.1,
        }
    }

    /// Delay for a given zero-indexed attempt number, with jitter applied.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(self.base, self.factor, self.cap, self.jitter, attempt)
    }
}

/// Compute `min(base * factor^attempt, cap)` and apply `±jitter` fraction
/// using a uniformly sampled multiplier in `[1-jitter, 1+jitter]`.
#[must_use]
pub fn backoff_delay(
    base: Duration,
    factor: f64,
    cap: Duration,
    jitter: f64,
    attempt: u32,
) -> Duration {
    let raw = base.as_secs_f64() * factor.powi(attempt.try_into().unwrap_or(i32::MAX));
    let capped = raw.min(cap.as_secs_f64());
    let jitter_factor = if jitter <= 0.0 {
        1.0
    } else {
        1.0 + rand::Rng::gen_range(&mut rand::thread_rng(), -jitter..=jitter)
    };
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::mcp_reconnect();
        for attempt in 0..10 {
            let d = policy.delay_for(attempt);
            assert!(d.as_secs_f64() <= 66.0, "attempt {attempt} delay {d:?} exceeds cap+jitter");
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let d1 = backoff_delay(
            Duration::from_secs(1),
            2.0,
            Duration::from_secs(60),
            0.0,
            3,
        );
        assert_eq!(d1, Duration::from_secs(8));
    }

    #[test]
    fn cap_is_respected_for_large_attempts() {
        let d = backoff_delay(Duration::from_secs(1), 2.0, Duration::from_secs(60), 0.0, 20);
        assert_eq!(d, Duration::from_secs(60));
    }
}
