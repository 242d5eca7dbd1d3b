//! Retry with exponential backoff for remote calls.
//!
//! Transient failures are retried up to a limit; terminal ones (see
//! [`RemoteError::is_terminal`]) bail on the first attempt.

use std::future::Future;
use std::time::Duration;

use shipwright_config::RetryConfig;
use shipwright_plugin::RemoteError;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry behavior for one remote namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor between delays.
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            retries: config.retries,
            min_delay: Duration::from_millis(config.min_timeout_ms),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Returns a policy that never waits, for tests.
    #[must_use]
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Runs `operation`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the terminal error immediately, or the last transient error
    /// once retries are exhausted.
    pub async fn run<F, Fut, T>(&self, action: &str, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut delay = self.min_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) if error.is_terminal() => {
                    warn!(action, %error, "remote call bailed");
                    return Err(error);
                }
                Err(error) if attempt > self.retries => {
                    warn!(action, attempts = attempt, %error, "remote call failed after retries");
                    return Err(error);
                }
                Err(error) => {
                    warn!(action, attempt, %error, ?delay, "remote call failed, retrying");
                    sleep(delay).await;
                    delay = Duration::from_secs_f64(delay.as_secs_f64() * self.factor)
                        .min(self.max_delay);
                }
            }
        }
    }

    /// Like [`RetryPolicy::run`], but in dry-run mode logs `action` and
    /// returns `simulated()` without calling anything.
    ///
    /// # Errors
    ///
    /// Same as [`RetryPolicy::run`].
    pub async fn run_or_simulate<F, Fut, T, S>(
        &self,
        dry_run: bool,
        action: &str,
        operation: F,
        simulated: S,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
        S: FnOnce() -> T,
    {
        if dry_run {
            info!(action, dry_run = true, "skipping remote call");
            return Ok(simulated());
        }
        self.run(action, operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.min_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let result = RetryPolicy::immediate(2)
            .run("create release", || async { Ok::<_, RemoteError>(42) })
            .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_terminal_status_bails_after_one_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::immediate(2)
            .run("create release", move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RemoteError::http(401, "Bad credentials")) }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "401 (Bad credentials)");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_status_exhausts_three_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::immediate(2)
            .run("create release", move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(RemoteError::http(503, "Service Unavailable")) }
            })
            .await;

        assert_eq!(result.unwrap_err().status, Some(503));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::immediate(2)
            .run("upload asset", move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(RemoteError::transport("connection reset"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_waits_between_attempts() {
        let policy = RetryPolicy {
            retries: 2,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            factor: 2.0,
        };

        let start = std::time::Instant::now();
        let _ = policy
            .run("create release", || async {
                Err::<(), _>(RemoteError::http(500, "boom"))
            })
            .await;

        // 10ms + 20ms, no wait after the last attempt
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_dry_run_short_circuits() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = RetryPolicy::immediate(2)
            .run_or_simulate(
                true,
                "create release",
                move || {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, RemoteError>("real".to_string()) }
                },
                || "simulated".to_string(),
            )
            .await;

        assert_eq!(result.unwrap(), "simulated");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
