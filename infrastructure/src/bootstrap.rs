//! Wiring: build a ready-to-use discussion engine from file config.

use std::sync::Arc;
use tracing::info;

use crate::config::FileConfig;
use crate::providers::{CliProviderAdapter, MockProviderAdapter, ResilientExecutor};
use concord_application::{DiscussionEngine, MessageRouter, RateLimiter};

/// Build the executor stack from configuration: rate limiter with file
/// overrides, per-agent delays, and the locally available adapters.
pub async fn executor_from_config(config: &FileConfig) -> Arc<ResilientExecutor> {
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits.to_rate_limit_config()));
    for agent in &config.agents {
        if let Some(delay_ms) = agent.rate_limit_delay_ms {
            rate_limiter.set_agent_delay(&agent.id, delay_ms).await;
        }
    }

    let executor = ResilientExecutor::new(rate_limiter)
        .register(Arc::new(CliProviderAdapter::claude()))
        .register(Arc::new(CliProviderAdapter::ollama()))
        .register(Arc::new(MockProviderAdapter::new()));
    Arc::new(executor)
}

/// Build a discussion engine with a fresh router from configuration.
pub async fn engine_from_config(config: &FileConfig) -> DiscussionEngine<ResilientExecutor> {
    let executor = executor_from_config(config).await;
    info!(agents = config.agents.len(), "engine assembled from config");
    DiscussionEngine::new(executor, Arc::new(MessageRouter::new()))
}
