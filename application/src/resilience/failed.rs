//! Bounded tracking of permanently failed prompts.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::retry::ErrorKind;

/// Default capacity of the tracker.
pub const DEFAULT_MAX_FAILED: usize = 50;

/// A prompt that failed after exhausting retries (or fatally).
#[derive(Debug, Clone)]
pub struct FailedQuestion {
    pub agent_id: String,
    pub agent_role: String,
    pub prompt: String,
    pub error_kind: ErrorKind,
    pub error_message: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl FailedQuestion {
    pub fn new(
        agent_id: impl Into<String>,
        agent_role: impl Into<String>,
        prompt: impl Into<String>,
        error_kind: ErrorKind,
        error_message: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_role: agent_role.into(),
            prompt: prompt.into(),
            error_kind,
            error_message: error_message.into(),
            retry_count,
            timestamp: Utc::now(),
        }
    }
}

/// FIFO store of failed prompts with a fixed capacity. When full, the
/// oldest entry is evicted.
pub struct FailedQuestionTracker {
    entries: Mutex<VecDeque<FailedQuestion>>,
    max_failed: usize,
}

impl FailedQuestionTracker {
    pub fn new(max_failed: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_failed)),
            max_failed,
        }
    }

    pub fn record(&self, failed: FailedQuestion) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(failed);
        while entries.len() > self.max_failed {
            entries.pop_front();
        }
    }

    /// Snapshot of all tracked failures, oldest first.
    pub fn all(&self) -> Vec<FailedQuestion> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

impl Default for FailedQuestionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILED)
    }
}
