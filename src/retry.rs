//! Retry loop shared by every remote call.
//!
//! Callers supply a classifier that decides, per error, whether to give up or
//! which [`Backoff`] shape to wait with before the next attempt.

use crate::error::Error;
use std::time::Duration;
use tracing::warn;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Shape of the wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^(attempt - 1)`
    Exponential,
    /// `base * attempt`
    Linear,
}

impl Backoff {
    /// Computes the delay after the given 1-based attempt.
    #[must_use]
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor)
            }
            Self::Linear => base.saturating_mul(attempt),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait according to the backoff and try again
    Retry(Backoff),
    /// Return the error immediately
    Abort,
}

/// Retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Base delay fed to the backoff
    pub base_delay: Duration,
    /// Upper bound on a single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempts and base delay.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Returns the capped wait after `attempt` for the given backoff.
    #[must_use]
    pub fn wait_for(&self, backoff: Backoff, attempt: u32) -> Duration {
        backoff.delay(self.base_delay, attempt).min(self.max_delay)
    }

    /// Runs `op` until it succeeds, the classifier aborts, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. When attempts are exhausted
    /// the last error is returned.
    pub fn run<T, E, F, C>(&self, mut op: F, classify: C) -> std::result::Result<T, E>
    where
        F: FnMut(u32) -> std::result::Result<T, E>,
        C: Fn(&E) -> RetryDecision,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let backoff = match classify(&err) {
                        RetryDecision::Abort => return Err(err),
                        RetryDecision::Retry(backoff) => backoff,
                    };

                    if attempt >= max_attempts {
                        return Err(err);
                    }

                    let delay = self.wait_for(backoff, attempt);
                    warn!(
                        "Attempt {}/{} failed: {}. Retrying in {}ms",
                        attempt,
                        max_attempts,
                        err,
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Classifier for provider calls.
///
/// Rate limits back off exponentially, configuration and validation problems
/// abort, everything else backs off linearly.
#[must_use]
pub fn classify_api_error(err: &Error) -> RetryDecision {
    match err {
        Error::RateLimited { .. } => RetryDecision::Retry(Backoff::Exponential),
        Error::Config { .. } | Error::Validation { .. } => RetryDecision::Abort,
        _ => RetryDecision::Retry(Backoff::Linear),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_exponential_delays() {
        let base = Duration::from_millis(100);
        assert_eq!(Backoff::Exponential.delay(base, 1), Duration::from_millis(100));
        assert_eq!(Backoff::Exponential.delay(base, 2), Duration::from_millis(200));
        assert_eq!(Backoff::Exponential.delay(base, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_linear_delays() {
        let base = Duration::from_millis(100);
        assert_eq!(Backoff::Linear.delay(base, 1), Duration::from_millis(100));
        assert_eq!(Backoff::Linear.delay(base, 2), Duration::from_millis(200));
        assert_eq!(Backoff::Linear.delay(base, 3), Duration::from_millis(300));
    }

    #[test]
    fn test_wait_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
        };
        assert_eq!(policy.wait_for(Backoff::Exponential, 5), Duration::from_secs(15));
    }

    #[test]
    fn test_succeeds_after_failures() {
        let calls = Cell::new(0);
        let result: Result<u32, Error> = instant_policy(3).run(
            |attempt| {
                calls.set(calls.get() + 1);
                if attempt < 3 {
                    Err(Error::network("http://x", "reset"))
                } else {
                    Ok(attempt)
                }
            },
            classify_api_error,
        );

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhaustion_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), Error> = instant_policy(3).run(
            |attempt| {
                calls.set(calls.get() + 1);
                Err(Error::api("openai", 500, format!("failure {attempt}")))
            },
            classify_api_error,
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 3"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_abort_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), Error> = instant_policy(5).run(
            |_| {
                calls.set(calls.get() + 1);
                Err(Error::config("missing key"))
            },
            classify_api_error,
        );

        assert!(result.unwrap_err().is_config());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_classifier() {
        assert_eq!(
            classify_api_error(&Error::rate_limited("openai", "429")),
            RetryDecision::Retry(Backoff::Exponential)
        );
        assert_eq!(
            classify_api_error(&Error::api("openai", 500, "oops")),
            RetryDecision::Retry(Backoff::Linear)
        );
        assert_eq!(
            classify_api_error(&Error::validation("bad")),
            RetryDecision::Abort
        );
    }
}
