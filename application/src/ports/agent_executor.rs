//! Agent executor port
//!
//! Defines the interface for sending prompts to LLM-backed agents.

use async_trait::async_trait;
use concord_domain::Participant;
use thiserror::Error;

/// Errors produced by agent execution, classified for retry handling.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    /// Transient failure, worth retrying with backoff.
    #[error("retryable error: {0}")]
    Retryable(String),

    /// Provider throttling, retry after a longer backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Permanent failure such as bad credentials, never retried.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecutionError::Fatal(_))
    }
}

/// A completed agent response.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub content: String,
    pub duration_ms: u64,
    pub tokens_used: Option<u64>,
}

/// Port for prompting agents.
///
/// This is how the application layer reaches LLM providers.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Send a prompt to the given participant's provider and wait for
    /// the full response.
    async fn prompt(
        &self,
        participant: &Participant,
        prompt: &str,
    ) -> Result<AgentReply, ExecutionError>;
}
