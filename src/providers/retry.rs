//! Retry policy and backoff executor
//!
//! A [`RetryPolicy`] decides *whether* a failed call is retried and *how
//! long* to wait before the next attempt. [`retry_with_backoff`] runs an
//! async operation under a policy. Delays use `tokio::time::sleep`, so tests
//! can drive them with a paused clock.

use crate::config::RetryConfig;
use crate::providers::base::BackendError;
use crate::providers::classify::{classify, ErrorType};
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Retry policy for one kind of outbound call
///
/// `max_retries` counts *additional* attempts: a policy with
/// `max_retries = 3` makes at most four calls. The wait before retry `n`
/// (0-based) is `base_delay * 2^n`.
pub struct RetryPolicy<E> {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Predicate selecting the errors worth retrying
    pub is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Create a policy
    pub fn new(max_retries: u32, base_delay: Duration, is_retryable: fn(&E) -> bool) -> Self {
        Self {
            max_retries,
            base_delay,
            is_retryable,
        }
    }

    /// Policy that never retries
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            is_retryable: |_| false,
        }
    }

    /// Delay to wait before retry number `attempt` (0-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::providers::retry::RetryPolicy;
    /// use bharat_ai::providers::BackendError;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::<BackendError>::overload_default();
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(2000));
    /// assert_eq!(policy.delay_for(1), Duration::from_millis(4000));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(8000));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl RetryPolicy<BackendError> {
    /// Retry overload failures 3 times starting at 2 seconds
    pub fn overload_default() -> Self {
        Self::from_config(&RetryConfig::default())
    }

    /// Retry overload failures with thresholds from configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay(), is_overload)
    }
}

/// Retry predicate: the failure classifies as [`ErrorType::Overload`]
pub fn is_overload(error: &BackendError) -> bool {
    classify(error) == ErrorType::Overload
}

/// Ephemeral bookkeeping for one call under a retry policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempts: u32,
    /// Diagnostic of the most recent failure
    pub last_error: Option<String>,
    /// Delay chosen before the next attempt
    pub next_delay: Option<Duration>,
}

/// Run `operation` under `policy`, sleeping between retryable failures
///
/// The closure receives the 0-based attempt number. Non-retryable failures
/// and the failure after the last retry are returned unchanged.
///
/// # Examples
///
/// ```
/// use bharat_ai::providers::retry::{retry_with_backoff, RetryPolicy};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy: RetryPolicy<String> = RetryPolicy::new(2, Duration::from_millis(1), |_| true);
/// let result: Result<u32, String> = retry_with_backoff(&policy, "demo", |attempt| async move {
///     if attempt < 2 { Err("busy".to_string()) } else { Ok(attempt) }
/// })
/// .await;
/// assert_eq!(result, Ok(2));
/// # }
/// ```
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut state = RetryState::default();

    loop {
        let attempt = state.attempts;
        state.attempts += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = state.attempts,
                        "Call succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let retryable = (policy.is_retryable)(&err);
                if !retryable || attempt >= policy.max_retries {
                    if retryable {
                        tracing::warn!(
                            operation = operation_name,
                            attempts = state.attempts,
                            "Retries exhausted: {}",
                            err
                        );
                    }
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                state.last_error = Some(err.to_string());
                state.next_delay = Some(delay);

                tracing::warn!(
                    operation = operation_name,
                    attempt = state.attempts,
                    max_attempts = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying: {}",
                    err
                );
                metrics::increment_counter!(
                    "bharat_provider_retries_total",
                    "operation" => operation_name.to_string()
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
