//! Bounded retry around store calls.

use crate::error::{LoaderError, Result};
use hobart_data::DataError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Retry schedule with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts including the first call
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that calls once and never sleeps.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1_u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// attempts run out.
    pub fn run<T, F>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, DataError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err.into()),
                Err(err) if attempt >= attempts => {
                    return Err(LoaderError::RetryExhausted {
                        operation: operation.to_string(),
                        attempts,
                        source: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    warn!(operation, attempt, ?delay, error = %err, "store call failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;

    fn busy() -> DataError {
        DataError::Io(std::io::Error::other("busy"))
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    #[rstest]
    #[case(1, 500)]
    #[case(2, 1_000)]
    #[case(3, 2_000)]
    #[case(10, 10_000)]
    fn test_backoff_doubles_up_to_cap(#[case] attempt: u32, #[case] ms: u64) {
        assert_eq!(RetryPolicy::default().backoff(attempt), Duration::from_millis(ms));
    }

    #[test]
    fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = quick(3).run("fetch", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(busy()) } else { Ok(7) }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let calls = Cell::new(0);
        let result: Result<()> = quick(2).run("persist", || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        assert!(matches!(
            result,
            Err(LoaderError::RetryExhausted { attempts: 2, .. })
        ));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_permanent_error_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = quick(5).run("fetch", || {
            calls.set(calls.get() + 1);
            Err(DataError::Parse("bad date".to_string()))
        });
        assert!(matches!(result, Err(LoaderError::Data(DataError::Parse(_)))));
        assert_eq!(calls.get(), 1);
    }
}
