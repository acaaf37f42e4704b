// src/services/retry.rs
use crate::errors::OutfitError;
use log::warn;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Delay grows as `base_delay * attempt`.
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for a single attempt.
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay * attempt,
        }
    }

    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self.backoff = Backoff::Fixed;
        self
    }
}

/// Runs `operation` until it succeeds, returns a non-retryable error, or
/// `max_attempts` is exhausted. Each attempt is bounded by `call_timeout`.
pub async fn retry_operation<T, F, Fut, P>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, OutfitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OutfitError>>,
    P: Fn(&OutfitError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match tokio::time::timeout(policy.call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(OutfitError::Timeout(format!(
                "{label} did not respond within {:?}",
                policy.call_timeout
            ))),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt >= max_attempts {
            warn!("{label}: giving up after {attempt} attempts: {err}");
            return Err(err);
        }

        let delay = policy.delay_after(attempt);
        warn!("{label}: attempt {attempt}/{max_attempts} failed ({err}), retrying in {delay:?}");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
