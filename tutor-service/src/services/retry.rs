//! Bounded retry with exponential backoff for provider calls.
//!
//! Only transient failures (see [`ProviderError::is_transient`]) are retried;
//! authentication and request errors fail on the first attempt.

use super::providers::ProviderError;
use crate::config::ProviderSettings;
use backoff::future::retry;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial backoff duration before first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration, also caps server-requested delays.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build()
    }
}

impl From<&ProviderSettings> for RetryPolicy {
    fn from(settings: &ProviderSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the retry budget
/// is spent. The last error is returned.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_retries = policy.max_retries;
    let max_backoff = policy.max_backoff;
    let mut attempt = 0u32;

    retry(policy.backoff(), || {
        attempt += 1;
        let current = attempt;
        let call = operation();

        async move {
            match call.await {
                Ok(value) => Ok(value),
                Err(err) if err.is_transient() && current <= max_retries => {
                    warn!(
                        operation = operation_name,
                        attempt = current,
                        max_retries,
                        error = %err,
                        "Transient provider failure, retrying"
                    );
                    match err.retry_after() {
                        Some(delay) => Err(backoff::Error::retry_after(err, delay.min(max_backoff))),
                        None => Err(backoff::Error::transient(err)),
                    }
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        }
    })
    .await
}
