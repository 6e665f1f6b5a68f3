//! Mock provider for tests and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ProviderAdapter, ProviderKind};
use concord_application::ExecutionError;

/// Returns scripted responses in order, then falls back to a generic
/// supportive answer.
#[derive(Default)]
pub struct MockProviderAdapter {
    responses: Mutex<VecDeque<Result<String, ExecutionError>>>,
}

impl MockProviderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<String, ExecutionError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn push(&self, response: Result<String, ExecutionError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn send(&self, _model: &str, _prompt: &str) -> Result<String, ExecutionError> {
        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(response) => response,
            None => Ok("Looks reasonable to me.\n[POSITION: SUPPORT] - mock response".to_string()),
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}
