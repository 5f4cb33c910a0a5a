//! Deterministic backoff schedule for retried generation calls.

use std::time::Duration;

/// Exponential backoff with quota-driven escalation.
///
/// The delay before retry `k` (1-based) is `base * 2^(k-1)`, clamped to `max`
/// when set. [`Backoff::escalate`] doubles `base` for every later delay; the
/// schedule therefore never decreases within one retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
}

impl Backoff {
    pub fn new(base: Duration, max: Option<Duration>) -> Self {
        Self { base, max }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self.base.saturating_mul(1u32 << exponent);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Double the base delay for the remainder of this schedule.
    pub fn escalate(&mut self) {
        self.base = self.base.saturating_mul(2);
    }
}

/// True when an error message signals rate limiting or an exhausted quota.
pub fn is_quota_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("429")
        || lower.contains("quota")
        || lower.contains("rate limit")
        || lower.contains("rate-limit")
        || lower.contains("resource exhausted")
        || lower.contains("resource_exhausted")
}
