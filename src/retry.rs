//! Opt-in retry with exponential backoff
//!
//! The extractor archives whatever the weather API returns and does not retry by
//! default: [`RetryConfig::max_attempts`] is `0`. Raising it makes transport
//! failures of the weather query (timeouts, refused connections) retry with
//! exponential backoff and optional jitter before the cycle gives up.
//!
//! ```no_run
//! use weather_extract::clock::TokioSleeper;
//! use weather_extract::config::RetryConfig;
//! use weather_extract::error::Error;
//! use weather_extract::retry::with_retry;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig { max_attempts: 3, ..Default::default() };
//! let body = with_retry(&config, &TokioSleeper, || async {
//!     Ok::<String, Error>("{}".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::clock::Sleeper;
use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth another attempt) or permanent
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Auth(_) => false,
            Error::Storage { .. } => false,
            Error::Config { .. } => false,
            Error::Serialization(_) => false,
            Error::InvalidUrl(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Run an async operation, retrying retryable failures with exponential backoff
///
/// Performs at most `config.max_attempts + 1` calls. Non-retryable errors are
/// returned immediately. Backoff waits go through `sleeper`.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                let wait = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = wait.as_millis(),
                    "Operation failed, retrying"
                );

                sleeper.sleep(wait).await;
                delay = next_delay(delay, config);
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// Products that do not fit a `Duration` saturate to `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Stretch a delay by a random factor in `[1.0, 2.0]`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records requested waits without waiting
    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn waits(&self) -> Vec<Duration> {
            self.waits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    fn timeout_error() -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"))
    }

    async fn always_timing_out(config: &RetryConfig, sleeper: &RecordingSleeper) -> u32 {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(config, sleeper, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(timeout_error())
            }
        })
        .await;

        assert!(result.is_err());
        calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn default_config_never_retries() {
        let sleeper = RecordingSleeper::default();
        let calls = always_timing_out(&RetryConfig::default(), &sleeper).await;

        assert_eq!(calls, 1, "retry is opt-in");
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let sleeper = RecordingSleeper::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&fast(3), &sleeper, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(timeout_error())
                } else {
                    Ok("body")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = always_timing_out(&fast(2), &sleeper).await;

        assert_eq!(calls, 3, "initial call + 2 retries");
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn backoff_waits_use_the_injected_sleeper() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(90),
            backoff_multiplier: 2.0,
            jitter: false,
        };
        let sleeper = RecordingSleeper::default();

        let start = std::time::Instant::now();
        always_timing_out(&config, &sleeper).await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(
            sleeper.waits(),
            vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(90),
                Duration::from_secs(90),
            ]
        );
    }

    #[tokio::test]
    async fn out_of_range_backoff_saturates_instead_of_panicking() {
        let sleeper = RecordingSleeper::default();
        let negative = RetryConfig {
            backoff_multiplier: -1.0,
            ..fast(2)
        };
        assert_eq!(always_timing_out(&negative, &sleeper).await, 3);

        let huge = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::MAX,
            backoff_multiplier: f64::MAX,
            jitter: true,
        };
        assert_eq!(always_timing_out(&huge, &sleeper).await, 3);
    }

    #[test]
    fn next_delay_is_capped() {
        let config = fast(1);
        assert_eq!(
            next_delay(Duration::from_millis(400), &config),
            Duration::from_millis(800)
        );
        assert_eq!(
            next_delay(Duration::from_millis(800), &config),
            Duration::from_secs(1)
        );
        let nan = RetryConfig {
            backoff_multiplier: f64::NAN,
            ..fast(1)
        };
        assert_eq!(next_delay(Duration::from_millis(10), &nan), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let sleeper = RecordingSleeper::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_retry(&fast(5), &sleeper, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Auth("invalid_client".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permanent_errors() {
        assert!(!Error::config_key("ADLS_NAME", "missing").is_retryable());
        assert!(!Error::Other("x".into()).is_retryable());
        assert!(
            !Error::Storage {
                path: "p".into(),
                status: Some(503),
                reason: "r".into(),
            }
            .is_retryable()
        );
        assert!(
            !Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x")).is_retryable()
        );
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..50 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay);
            assert!(jittered <= delay * 2);
        }
    }
}
