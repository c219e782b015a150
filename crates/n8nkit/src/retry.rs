//! Retry logic with exponential backoff for transient errors.
//!
//! Only idempotent requests (listing and deleting) go through here; a
//! repeated create could leave a duplicate behind.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use declarative::OperationContext;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback: Sync {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Current attempt number (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_ms` - Milliseconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128);
}

/// Callback that logs retries at warn level.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_ms: u128) {
        log::warn!("Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {delay_ms}ms...");
    }
}

/// Execute an operation with retry logic.
///
/// Retries the operation if it returns a retryable error, using exponential
/// backoff between attempts. The context is checked before every attempt,
/// and no retry is scheduled past its deadline.
///
/// # Returns
/// The result of the operation, or the last error if all attempts failed.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    ctx: &OperationContext,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        ctx.checkpoint()?;

        let err = match operation() {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt + 1 >= max_attempts {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt);
        if ctx.remaining().is_some_and(|r| r <= delay) {
            return Err(err);
        }

        if let Some(cb) = callback {
            cb.on_retry(attempt + 1, max_attempts, &err, delay.as_millis());
        }

        thread::sleep(delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::CancellationToken;
    use std::cell::Cell;
    use std::time::Duration;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_with_retry_success_first_try() {
        let ctx = OperationContext::new();
        let result = with_retry(&RetryConfig::no_retry(), &ctx, None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_with_retry_non_retryable_error() {
        let ctx = OperationContext::new();
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&fast(3), &ctx, None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::http(404, "not found"))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_with_retry_eventual_success() {
        let ctx = OperationContext::new();
        let attempts = Cell::new(0);

        let result = with_retry(&fast(3), &ctx, None, || {
            let current = attempts.get();
            attempts.set(current + 1);
            if current < 2 {
                Err(Error::Network("connection reset".to_string()))
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_with_retry_exhausted() {
        let ctx = OperationContext::new();
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&fast(2), &ctx, None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::http(503, "unavailable"))
        });

        assert!(matches!(result, Err(Error::Http { status: 503, .. })));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_cancelled_context_skips_operation() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OperationContext::with_token(token);
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&fast(3), &ctx, None, || {
            attempts.set(attempts.get() + 1);
            Ok(())
        });

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.get(), 0);
    }

    #[test]
    fn test_no_retry_past_deadline() {
        let ctx = OperationContext::new().timeout(Duration::from_millis(50));
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(5),
        };
        let attempts = Cell::new(0);

        let result: Result<()> = with_retry(&config, &ctx, None, || {
            attempts.set(attempts.get() + 1);
            Err(Error::Timeout)
        });

        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(attempts.get(), 1);
    }
}
