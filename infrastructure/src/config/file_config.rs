//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use concord_application::RateLimitConfig;
use concord_domain::Participant;

use crate::providers::ProviderKind;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("agent id cannot be empty")]
    EmptyAgentId,

    #[error("duplicate agent id: {0}")]
    DuplicateAgentId(String),

    #[error("unknown provider for agent {agent}: {provider}")]
    UnknownProvider { agent: String, provider: String },

    #[error("max_rounds cannot be 0")]
    InvalidMaxRounds,
}

/// One agent entry from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub id: String,
    pub name: String,
    pub role: String,
    pub model: String,
    pub provider: String,
    pub enabled: bool,
    /// Overrides the provider's rate-limit spacing for this agent.
    pub rate_limit_delay_ms: Option<u64>,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            role: String::new(),
            model: String::new(),
            provider: ProviderKind::default().name().to_string(),
            enabled: true,
            rate_limit_delay_ms: None,
        }
    }
}

impl FileAgentConfig {
    pub fn to_participant(&self) -> Participant {
        let name = if self.name.is_empty() {
            self.id.clone()
        } else {
            self.name.clone()
        };
        let mut participant = Participant::new(&self.id, name, &self.role)
            .with_model(&self.model)
            .with_provider(&self.provider);
        participant.enabled = self.enabled;
        participant
    }
}

/// Discussion behavior from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDiscussionConfig {
    pub max_rounds: usize,
    pub moderator: String,
}

impl Default for FileDiscussionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            moderator: "orchestrator".to_string(),
        }
    }
}

/// Rate limiting overrides from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRateLimitConfig {
    /// Per-provider delays in milliseconds, merged over the built-ins.
    pub providers: HashMap<String, u64>,
    pub default_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

impl FileRateLimitConfig {
    /// Built-in defaults overridden by whatever the file sets.
    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::default();
        for (provider, delay) in &self.providers {
            config.delays_ms.insert(provider.clone(), *delay);
        }
        if let Some(default) = self.default_delay_ms {
            config.default_delay_ms = default;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(initial) = self.initial_backoff_ms {
            config.initial_backoff_ms = initial;
        }
        if let Some(max) = self.max_backoff_ms {
            config.max_backoff_ms = max;
        }
        config
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub agents: Vec<FileAgentConfig>,
    pub discussion: FileDiscussionConfig,
    pub rate_limits: FileRateLimitConfig,
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.discussion.max_rounds == 0 {
            return Err(ConfigValidationError::InvalidMaxRounds);
        }
        let mut seen = Vec::new();
        for agent in &self.agents {
            if agent.id.is_empty() {
                return Err(ConfigValidationError::EmptyAgentId);
            }
            if seen.contains(&agent.id) {
                return Err(ConfigValidationError::DuplicateAgentId(agent.id.clone()));
            }
            seen.push(agent.id.clone());
            if ProviderKind::from_name(&agent.provider).is_none() {
                return Err(ConfigValidationError::UnknownProvider {
                    agent: agent.id.clone(),
                    provider: agent.provider.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.agents.iter().map(FileAgentConfig::to_participant).collect()
    }
}
