//! Discussion participants.

use serde::{Deserialize, Serialize};

/// An agent taking part in discussions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier, unique within a room.
    pub id: String,
    /// Display name used in transcripts and prompts.
    pub name: String,
    /// Role label such as `architect` or `security`.
    pub role: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Provider name, e.g. `anthropic` or `claude-cli`.
    pub provider: String,
    /// Disabled participants are skipped without affecting consensus.
    pub enabled: bool,
}

impl Participant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            model: String::new(),
            provider: String::new(),
            enabled: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
