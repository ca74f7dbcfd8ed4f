//! Bounded retry-with-backoff execution of fallible operations.

use std::time::Duration;

use cellstore_core::{CellstoreError, Result};

use crate::config::RetryConfig;

/// Hard cap on a single backoff sleep, in seconds.
const MAX_BACKOFF_SECS: f64 = 3600.0;

/// Predicate deciding which errors an operation retries on.
pub type RetryMatcher = fn(&CellstoreError) -> bool;

/// Executes an operation with bounded exponential backoff.
///
/// The operation runs immediately. When it fails with an error the matcher
/// accepts and retries remain, the policy sleeps `base ^ retry_count`
/// seconds (capped at one hour), increments its counter and re-executes.
/// Errors the matcher rejects, and the last error once retries are
/// exhausted, propagate untouched.
///
/// A policy instance tracks the retry count of one logical operation;
/// construct a fresh one per operation.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    matches: RetryMatcher,
    attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy retrying on connection faults.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_matcher(config, CellstoreError::is_connection_fault)
    }

    /// Creates a policy with an explicit error matcher.
    pub fn with_matcher(config: RetryConfig, matches: RetryMatcher) -> Self {
        Self {
            config,
            matches,
            attempts: 0,
        }
    }

    /// Returns how many retries have been spent so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Runs the operation, retrying per the policy.
    pub async fn run<T, F>(&mut self, mut op: F) -> Result<T>
    where
        F: AsyncFnMut() -> Result<T>,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !(self.matches)(&error) || self.attempts >= self.config.max_retries() {
                        return Err(error);
                    }
                    let delay = backoff_delay(self.config.base_backoff_secs(), self.attempts);
                    tracing::info!(
                        error = %error,
                        kind = error.kind_name(),
                        delay_secs = delay.as_secs_f64(),
                        retry = self.attempts + 1,
                        max_retries = self.config.max_retries(),
                        "operation failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    self.attempts += 1;
                }
            }
        }
    }
}

/// Computes the sleep before the retry numbered `retry_count`.
///
/// The exponent grows without bound, so the result is forced finite,
/// non-negative and capped at one hour.
fn backoff_delay(base_secs: f64, retry_count: u32) -> Duration {
    let exponent = retry_count.min(i32::MAX as u32) as i32;
    let secs = base_secs.powi(exponent).min(MAX_BACKOFF_SECS).max(0.0);
    Duration::from_secs_f64(secs)
}
