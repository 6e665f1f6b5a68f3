//! Resilient executor: adapter lookup plus rate limiting and retries.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{ProviderAdapter, ProviderKind};
use concord_application::{
    execute_with_retry, AgentExecutor, AgentReply, ExecutionError, RateLimiter,
};
use concord_domain::Participant;

/// Implements the application's executor port on top of registered
/// provider adapters. Every prompt goes through the shared rate limiter
/// and the retry loop.
pub struct ResilientExecutor {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    rate_limiter: Arc<RateLimiter>,
    /// Overall cap per prompt, spanning all retries. Exceeding it is
    /// fatal and never retried.
    agent_timeout: Option<Duration>,
}

impl ResilientExecutor {
    pub fn new(rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            adapters: HashMap::new(),
            rate_limiter,
            agent_timeout: None,
        }
    }

    pub fn register(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = Some(timeout);
        self
    }

    fn adapter_for(&self, provider: &str) -> Result<&Arc<dyn ProviderAdapter>, ExecutionError> {
        let kind = ProviderKind::from_name(provider)
            .ok_or_else(|| ExecutionError::Fatal(format!("unknown provider: {provider}")))?;
        self.adapters
            .get(&kind)
            .ok_or_else(|| ExecutionError::Fatal(format!("no adapter registered for {provider}")))
    }
}

#[async_trait]
impl AgentExecutor for ResilientExecutor {
    async fn prompt(
        &self,
        participant: &Participant,
        prompt: &str,
    ) -> Result<AgentReply, ExecutionError> {
        let adapter = self.adapter_for(&participant.provider)?;
        let started = Instant::now();
        debug!(agent = %participant.id, provider = %participant.provider, "dispatching prompt");

        let attempt_loop = execute_with_retry(
            &self.rate_limiter,
            &participant.provider,
            Some(&participant.id),
            || adapter.send(&participant.model, prompt),
        );
        let content = match self.agent_timeout {
            Some(timeout) => tokio::time::timeout(timeout, attempt_loop)
                .await
                .map_err(|_| {
                    ExecutionError::Fatal(format!(
                        "agent {} exceeded the {}s limit",
                        participant.id,
                        timeout.as_secs()
                    ))
                })??,
            None => attempt_loop.await?,
        };

        Ok(AgentReply {
            content,
            duration_ms: started.elapsed().as_millis() as u64,
            tokens_used: None,
        })
    }
}
