//! Retry with exponential backoff and jitter
//!
//! Backend adapters wrap their remote calls with [`retry_with_backoff`] so
//! that transient failures (timeouts, throttling, 5xx responses) do not
//! surface to the backup store. The store itself never retries.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` is reached
///
/// `label` names the remote call in debug logs.
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt);
                tracing::debug!(
                    operation = label,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Backoff for the given (1-based) attempt: initial * 2^(attempt-1), capped, plus jitter
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = config
        .initial_backoff_ms
        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10));
    let capped_ms = base_ms.min(config.max_backoff_ms);

    Duration::from_millis(capped_ms + jitter(capped_ms))
}

/// Pseudo-random value in `0..max` taken from the clock's sub-second nanos
fn jitter(max: u64) -> u64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % max.max(1)
}

/// Whether an adapter error is worth another attempt
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Network(msg) => {
            let msg = msg.to_lowercase();
            [
                "timeout",
                "timed out",
                "connection reset",
                "connection refused",
                "dispatch",
                "500",
                "502",
                "503",
                "504",
                "internal error",
                "service unavailable",
                "too many requests",
                "429",
                "slow down",
                "request rate",
            ]
            .iter()
            .any(|needle| msg.contains(needle))
        }
        Error::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
        Error::Store(_)
        | Error::NotFound(_)
        | Error::Conflict(_)
        | Error::Auth(_)
        | Error::InvalidPath(_)
        | Error::InvalidPattern(_)
        | Error::Config(_) => false,
        Error::General(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout") || msg.contains("temporary")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_calculate_backoff_doubles() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
        };

        let b1 = calculate_backoff(&config, 1);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 200);

        let b2 = calculate_backoff(&config, 2);
        assert!(b2.as_millis() >= 200 && b2.as_millis() < 400);

        let b3 = calculate_backoff(&config, 3);
        assert!(b3.as_millis() >= 400 && b3.as_millis() < 800);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 20,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        // cap plus at most the same amount of jitter
        assert!(calculate_backoff(&config, 20).as_millis() < 10_000);
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Network("Request timeout".into())));
        assert!(is_retryable_error(&Error::Network(
            "Service error: SlowDown (code: 503)".into()
        )));
        assert!(!is_retryable_error(&Error::Network("AccessDenied".into())));

        assert!(!is_retryable_error(&Error::Auth("access denied".into())));
        assert!(!is_retryable_error(&Error::NotFound("backups/db.sql".into())));
        assert!(!is_retryable_error(&Error::Conflict("bucket exists".into())));
        assert!(!is_retryable_error(&Error::Store("error deleting x".into())));
        assert!(is_retryable_error(&Error::Io(std::io::Error::from(
            std::io::ErrorKind::TimedOut
        ))));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(
            &fast(),
            "head_bucket",
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Network("timeout".into()))
                    } else {
                        Ok(7)
                    }
                }
            },
            is_retryable_error,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry_with_backoff(
            &fast(),
            "list_objects_v2",
            || {
                calls += 1;
                async { Err(Error::Network("503 Service Unavailable".into())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let mut calls = 0;
        let result: Result<()> = retry_with_backoff(
            &fast(),
            "head_object",
            || {
                calls += 1;
                async { Err(Error::NotFound("db.sql".into())) }
            },
            is_retryable_error,
        )
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig {
            max_attempts: 0,
            ..fast()
        };
        let mut calls = 0;
        let result = retry_with_backoff(
            &config,
            "put_object",
            || {
                calls += 1;
                async { Ok::<_, Error>(()) }
            },
            |_| true,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }
}
