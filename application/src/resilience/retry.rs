//! Error classification, exponential backoff, and the retry loop.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::rate_limit::{RateLimitConfig, RateLimiter};
use crate::ports::agent_executor::ExecutionError;

/// Retry class of an error, derived from its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient, retry with backoff.
    Retryable,
    /// Provider throttling.
    RateLimited,
    /// Do not retry.
    Fatal,
}

const RATE_LIMITED_PHRASES: &[&str] = &["rate limit", "429", "too many requests"];
const RETRYABLE_PHRASES: &[&str] = &["timeout", "network", "econnreset", "cli error", "spawn"];
const FATAL_PHRASES: &[&str] = &["auth", "invalid api key", "unauthorized"];

/// Classify an error message. Unknown errors default to retryable.
pub fn classify_error(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if RATE_LIMITED_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorKind::RateLimited;
    }
    if RETRYABLE_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorKind::Retryable;
    }
    if FATAL_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorKind::Fatal;
    }
    ErrorKind::Retryable
}

/// Wrap a raw error message in the matching `ExecutionError` variant.
pub fn classify_into_error(message: impl Into<String>) -> ExecutionError {
    let message = message.into();
    match classify_error(&message) {
        ErrorKind::RateLimited => ExecutionError::RateLimited(message),
        ErrorKind::Retryable => ExecutionError::Retryable(message),
        ErrorKind::Fatal => ExecutionError::Fatal(message),
    }
}

/// Exponential backoff with jitter: `initial * 2^attempt` capped at the
/// configured maximum, plus up to 10% random jitter against thundering
/// herds.
pub fn calculate_backoff(attempt: u32, config: &RateLimitConfig) -> Duration {
    let exponential = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    let jitter = (rand::thread_rng().gen_range(0.0..0.1) * exponential as f64) as u64;
    Duration::from_millis(exponential + jitter)
}

/// Run an operation under rate limiting with retries.
///
/// The provider's rate limit is awaited before every attempt. Fatal
/// errors and exhaustion of the configured retry budget end the loop;
/// everything else backs off and retries.
pub async fn execute_with_retry<T, F, Fut>(
    rate_limiter: &RateLimiter,
    provider: &str,
    agent_id: Option<&str>,
    operation: F,
) -> Result<T, ExecutionError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExecutionError>>,
{
    execute_with_retry_notify(rate_limiter, provider, agent_id, operation, |_, _| {}).await
}

/// Like `execute_with_retry`, invoking `on_retry(next_attempt, &error)`
/// before every backoff sleep.
pub async fn execute_with_retry_notify<T, F, Fut, N>(
    rate_limiter: &RateLimiter,
    provider: &str,
    agent_id: Option<&str>,
    operation: F,
    mut on_retry: N,
) -> Result<T, ExecutionError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ExecutionError>>,
    N: FnMut(u32, &ExecutionError),
{
    let config = rate_limiter.config();
    let max_retries = config.max_retries;
    let mut attempt = 0;
    loop {
        rate_limiter.wait_for_agent(provider, agent_id).await;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if let ExecutionError::Fatal(_) = error {
                    warn!(provider, %error, "fatal error, not retrying");
                    return Err(error);
                }
                if attempt >= max_retries {
                    warn!(provider, %error, attempt, "retries exhausted");
                    return Err(error);
                }
                let backoff = calculate_backoff(attempt, config);
                debug!(
                    provider,
                    %error,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "retrying after backoff"
                );
                on_retry(attempt + 1, &error);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn classify_rate_limit_phrases() {
        assert_eq!(classify_error("HTTP 429 Too Many Requests"), ErrorKind::RateLimited);
        assert_eq!(classify_error("Rate limit exceeded"), ErrorKind::RateLimited);
    }

    #[test]
    fn classify_retryable_phrases() {
        assert_eq!(classify_error("request timeout"), ErrorKind::Retryable);
        assert_eq!(classify_error("ECONNRESET"), ErrorKind::Retryable);
        assert_eq!(classify_error("failed to spawn process"), ErrorKind::Retryable);
    }

    #[test]
    fn classify_fatal_phrases() {
        assert_eq!(classify_error("invalid api key"), ErrorKind::Fatal);
        assert_eq!(classify_error("401 Unauthorized"), ErrorKind::Fatal);
    }

    #[test]
    fn unknown_errors_default_to_retryable() {
        assert_eq!(classify_error("something odd happened"), ErrorKind::Retryable);
    }

    #[test]
    fn rate_limited_wins_over_fatal_phrases() {
        // "rate limit" takes precedence even when "auth" also appears
        assert_eq!(
            classify_error("auth service rate limit hit"),
            ErrorKind::RateLimited
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RateLimitConfig::default();
        for attempt in 0..8 {
            let base = 2000u64.saturating_mul(2u64.pow(attempt)).min(30000);
            let backoff = calculate_backoff(attempt, &config).as_millis() as u64;
            assert!(backoff >= base, "attempt {attempt}: {backoff} < {base}");
            assert!(
                backoff <= base + base / 10,
                "attempt {attempt}: jitter beyond 10%"
            );
        }
    }

    #[test]
    fn backoff_never_exceeds_cap_plus_jitter() {
        let backoff = calculate_backoff(30, &RateLimitConfig::default()).as_millis() as u64;
        assert!(backoff <= 33000);
    }

    #[test]
    fn backoff_honors_configured_bounds() {
        let config = RateLimitConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 250,
            ..RateLimitConfig::default()
        };
        assert!(calculate_backoff(0, &config).as_millis() >= 100);
        assert!(calculate_backoff(10, &config).as_millis() as u64 <= 275);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let attempts = AtomicU32::new(0);
        let result = execute_with_retry(&limiter, "mock", None, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ExecutionError::Retryable("timeout".into()))
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&limiter, "mock", None, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Fatal("unauthorized".into()))
        })
        .await;
        assert!(matches!(result, Err(ExecutionError::Fatal(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&limiter, "mock", None, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Retryable("network glitch".into()))
        })
        .await;
        assert!(matches!(result, Err(ExecutionError::Retryable(_))));
        // initial attempt plus MAX_RETRIES
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn on_retry_reports_each_failed_attempt() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let attempts = AtomicU32::new(0);
        let mut notified = Vec::new();
        let result = execute_with_retry_notify(
            &limiter,
            "mock",
            None,
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ExecutionError::Retryable("timeout".into()))
                } else {
                    Ok("done")
                }
            },
            |attempt, error| notified.push((attempt, error.to_string())),
        )
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(notified.len(), 2);
        assert_eq!(notified[0].0, 1);
        assert_eq!(notified[1].0, 2);
        assert!(notified[0].1.contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_max_retries_bounds_the_loop() {
        let config = RateLimitConfig {
            max_retries: 1,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config);
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&limiter, "mock", None, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(ExecutionError::Retryable("network glitch".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
