//! Per-provider rate limiting.
//!
//! Each provider has a minimum delay between consecutive calls. Callers
//! await `wait_for_limit` before every request; the limiter sleeps just
//! long enough to honor the spacing and then records the call.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Minimum inter-call delays per provider, in milliseconds, plus the
/// retry/backoff settings shared with the retry loop.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub delays_ms: HashMap<String, u64>,
    /// Applied to providers without an explicit entry.
    pub default_delay_ms: u64,
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let delays_ms = [
            ("claude-cli", 1500),
            ("anthropic", 500),
            ("openai", 200),
            ("google", 200),
            ("ollama", 100),
            ("mock", 0),
        ]
        .into_iter()
        .map(|(provider, delay)| (provider.to_string(), delay))
        .collect();
        Self {
            delays_ms,
            default_delay_ms: 1000,
            max_retries: Self::MAX_RETRIES,
            initial_backoff_ms: Self::INITIAL_BACKOFF_MS,
            max_backoff_ms: Self::MAX_BACKOFF_MS,
        }
    }
}

impl RateLimitConfig {
    pub fn delay_for(&self, provider: &str) -> Duration {
        Duration::from_millis(
            self.delays_ms
                .get(provider)
                .copied()
                .unwrap_or(self.default_delay_ms),
        )
    }

    /// Default retry settings.
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 2000;
    pub const MAX_BACKOFF_MS: u64 = 30000;
}

#[derive(Debug, Clone, Default)]
pub struct RateLimiterStats {
    /// Calls recorded per provider.
    pub calls: HashMap<String, u64>,
    /// Total time spent waiting, per provider.
    pub waited_ms: HashMap<String, u64>,
}

/// Tracks the last call per provider and enforces spacing.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

#[derive(Default)]
struct LimiterState {
    last_call: HashMap<String, Instant>,
    agent_overrides: HashMap<String, u64>,
    stats: RateLimiterStats,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Override the spacing for one agent, regardless of its provider.
    pub async fn set_agent_delay(&self, agent_id: &str, delay_ms: u64) {
        let mut state = self.state.lock().await;
        state.agent_overrides.insert(agent_id.to_string(), delay_ms);
    }

    /// Sleep until the provider's minimum spacing has elapsed since its
    /// previous call, then record this call.
    pub async fn wait_for_limit(&self, provider: &str) {
        self.wait_for_agent(provider, None).await;
    }

    /// Like `wait_for_limit`, honoring a per-agent delay override.
    pub async fn wait_for_agent(&self, provider: &str, agent_id: Option<&str>) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let delay = agent_id
                    .and_then(|id| state.agent_overrides.get(id).copied())
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| self.config.delay_for(provider));
                let now = Instant::now();
                let wait = state
                    .last_call
                    .get(provider)
                    .map(|&last| delay.saturating_sub(now.duration_since(last)))
                    .unwrap_or(Duration::ZERO);
                if wait.is_zero() {
                    state.last_call.insert(provider.to_string(), now);
                    *state.stats.calls.entry(provider.to_string()).or_insert(0) += 1;
                    return;
                }
                *state
                    .stats
                    .waited_ms
                    .entry(provider.to_string())
                    .or_insert(0) += wait.as_millis() as u64;
                wait
            };
            debug!(provider, wait_ms = wait.as_millis() as u64, "rate limit wait");
            tokio::time::sleep(wait).await;
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn stats(&self) -> RateLimiterStats {
        self.state.lock().await.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_passes_immediately() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        limiter.wait_for_limit("anthropic").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        limiter.wait_for_limit("anthropic").await;
        limiter.wait_for_limit("anthropic").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn providers_are_limited_independently() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.wait_for_limit("anthropic").await;
        let start = Instant::now();
        limiter.wait_for_limit("ollama").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_provider_uses_default_delay() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        limiter.wait_for_limit("newprovider").await;
        limiter.wait_for_limit("newprovider").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_provider_never_waits() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait_for_limit("mock").await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_override_takes_precedence() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.set_agent_delay("slow-agent", 3000).await;
        limiter.wait_for_agent("ollama", Some("slow-agent")).await;
        let start = Instant::now();
        limiter.wait_for_agent("ollama", Some("slow-agent")).await;
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_count_calls_and_waits() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.wait_for_limit("anthropic").await;
        limiter.wait_for_limit("anthropic").await;
        let stats = limiter.stats().await;
        assert_eq!(stats.calls.get("anthropic"), Some(&2));
        assert!(*stats.waited_ms.get("anthropic").unwrap_or(&0) >= 500);
    }
}
