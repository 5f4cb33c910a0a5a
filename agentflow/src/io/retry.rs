//! Bounded retry with exponential backoff for generation and regeneration.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::backoff::{Backoff, is_quota_error};
use crate::error::PipelineError;

/// Attempts and delays for one retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(10),
            max_delay: None,
        }
    }
}

/// Waits between attempts. Tests substitute a recorder.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Results that count as a failed attempt when they carry nothing.
pub trait Substantive {
    fn is_blank(&self) -> bool;
}

impl Substantive for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl<T> Substantive for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

/// Runs an operation until it yields a non-blank result or attempts run out.
#[derive(Clone, Copy)]
pub struct RetryController<'a> {
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> RetryController<'a> {
    pub fn new(policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Call `op` with the 1-based attempt number until it succeeds.
    ///
    /// Errors and blank results are failures. The wait before retry `k` is
    /// `base * 2^(k-1)`; an error that looks like rate limiting doubles the
    /// base for the remaining waits. After the last attempt the final error
    /// is reported as [`PipelineError::RetryExhausted`].
    #[instrument(skip_all, fields(operation = %operation, max_attempts = self.policy.max_attempts))]
    pub fn with_retry<T, F>(&self, operation: &str, mut op: F) -> Result<T, PipelineError>
    where
        T: Substantive,
        F: FnMut(u32) -> Result<T>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut backoff = Backoff::new(self.policy.base_delay, self.policy.max_delay);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff.delay_for(attempt - 1);
                info!(attempt, delay_ms = delay.as_millis() as u64, "waiting before retry");
                self.sleeper.sleep(delay);
            }
            match op(attempt) {
                Ok(value) if !value.is_blank() => return Ok(value),
                Ok(_) => {
                    warn!(attempt, "attempt returned an empty result");
                    last_error = "empty result".to_string();
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    if is_quota_error(&message) {
                        backoff.escalate();
                        warn!(
                            attempt,
                            base_delay_ms = backoff.base().as_millis() as u64,
                            "rate limited, escalating backoff"
                        );
                    } else {
                        warn!(attempt, err = %message, "attempt failed");
                    }
                    last_error = message;
                }
            }
        }

        Err(PipelineError::RetryExhausted {
            operation: operation.to_string(),
            attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingSleeper;
    use anyhow::anyhow;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: None,
        }
    }

    #[test]
    fn first_success_skips_sleep() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(policy(3), &sleeper);
        let value = retry
            .with_retry("generate", |_| Ok("done".to_string()))
            .expect("ok");
        assert_eq!(value, "done");
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn third_attempt_succeeds_after_two_waits() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(policy(3), &sleeper);
        let mut calls = 0;
        let value = retry
            .with_retry("generate", |attempt| {
                calls += 1;
                if attempt < 3 {
                    Err(anyhow!("connection reset"))
                } else {
                    Ok("X".to_string())
                }
            })
            .expect("ok");
        assert_eq!(value, "X");
        assert_eq!(calls, 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[test]
    fn blank_results_count_as_failures() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(policy(2), &sleeper);
        let err = retry
            .with_retry("generate", |_| Ok("   ".to_string()))
            .expect_err("blank");
        match err {
            PipelineError::RetryExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error, "empty result");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quota_errors_escalate_backoff() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(policy(3), &sleeper);
        let err = retry
            .with_retry("generate", |_| -> Result<String> {
                Err(anyhow!("HTTP 429: quota exceeded"))
            })
            .expect_err("exhausted");
        assert!(matches!(err, PipelineError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(200), Duration::from_millis(800)]
        );
    }

    #[test]
    fn exhaustion_reports_last_error() {
        let sleeper = RecordingSleeper::default();
        let retry = RetryController::new(policy(2), &sleeper);
        let mut attempt_errors = vec!["first", "second"].into_iter();
        let err = retry
            .with_retry("generate", |_| -> Result<String> {
                Err(anyhow!(attempt_errors.next().unwrap_or("extra")))
            })
            .expect_err("exhausted");
        assert!(err.to_string().contains("second"));
        assert!(err.to_string().contains("after 2 attempt(s)"));
    }
}
