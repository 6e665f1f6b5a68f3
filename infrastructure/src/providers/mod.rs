//! Provider adapters: how prompts actually reach an LLM.

pub mod cli;
pub mod executor;
pub mod mock;

use async_trait::async_trait;
use concord_application::ExecutionError;

pub use cli::CliProviderAdapter;
pub use executor::ResilientExecutor;
pub use mock::MockProviderAdapter;

/// Known providers. Rate limiting and adapter lookup key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    #[default]
    ClaudeCli,
    Anthropic,
    OpenAi,
    Google,
    Ollama,
    Mock,
}

impl ProviderKind {
    /// Name as used in configuration and rate-limit tables.
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::ClaudeCli => "claude-cli",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Mock => "mock",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "claude-cli" => Some(ProviderKind::ClaudeCli),
            "anthropic" => Some(ProviderKind::Anthropic),
            "openai" => Some(ProviderKind::OpenAi),
            "google" => Some(ProviderKind::Google),
            "ollama" => Some(ProviderKind::Ollama),
            "mock" => Some(ProviderKind::Mock),
        _ => None,
        }
    }
}

/// A concrete way of sending a prompt to a model.
///
/// Adapters return plain strings; retry classification happens on the
/// error message text in the application layer.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send a prompt and wait for the complete response.
    async fn send(&self, model: &str, prompt: &str) -> Result<String, ExecutionError>;

    /// Whether the provider can currently be reached.
    async fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_name_round_trip() {
        for kind in [
            ProviderKind::ClaudeCli,
            ProviderKind::Anthropic,
            ProviderKind::OpenAi,
            ProviderKind::Google,
            ProviderKind::Ollama,
            ProviderKind::Mock,
        ] {
            assert_eq!(ProviderKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ProviderKind::from_name("azure"), None);
    }
}
