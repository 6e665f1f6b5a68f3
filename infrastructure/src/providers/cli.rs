//! Subprocess-based provider adapter.
//!
//! Spawns a local CLI (`claude`, `ollama`, ...), writes the prompt to
//! stdin, and reads the full response from stdout. Failures surface as
//! error text that the retry classifier understands.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ProviderAdapter, ProviderKind};
use concord_application::{classify_into_error, ExecutionError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter that shells out to a local CLI per prompt.
pub struct CliProviderAdapter {
    kind: ProviderKind,
    command: String,
    args: Vec<String>,
    /// Appended when set; lets `ollama run <model>` style CLIs work.
    model_as_arg: bool,
    timeout: Duration,
}

impl CliProviderAdapter {
    pub fn new(kind: ProviderKind, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            args,
            model_as_arg: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The `claude` CLI in non-interactive print mode.
    pub fn claude() -> Self {
        Self::new(
            ProviderKind::ClaudeCli,
            "claude",
            vec!["-p".to_string(), "--output-format".to_string(), "text".to_string()],
        )
    }

    /// `ollama run <model>` with the prompt on stdin.
    pub fn ollama() -> Self {
        let mut adapter = Self::new(ProviderKind::Ollama, "ollama", vec!["run".to_string()]);
        adapter.model_as_arg = true;
        adapter
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, model: &str, prompt: &str) -> Result<String, ExecutionError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.model_as_arg {
            command.arg(model);
        } else if !model.is_empty() {
            command.arg("--model").arg(model);
        }

        debug!(command = %self.command, model, "spawning provider cli");
        let mut child = command
            .spawn()
            .map_err(|e| classify_into_error(format!("spawn failed: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| classify_into_error(format!("cli error writing stdin: {e}")))?;
            // closes stdin so the child sees EOF
            drop(stdin);
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                classify_into_error(format!(
                    "cli timeout after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| classify_into_error(format!("cli error: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(command = %self.command, status = %output.status, "provider cli failed");
            return Err(classify_into_error(format!(
                "cli error (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ProviderAdapter for CliProviderAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, model: &str, prompt: &str) -> Result<String, ExecutionError> {
        self.run(model, prompt).await
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_command_round_trips_stdin() {
        // `cat` echoes the prompt back, standing in for a real CLI
        let adapter = CliProviderAdapter::new(ProviderKind::Mock, "cat", Vec::new());
        let reply = adapter.send("", "hello from stdin").await.unwrap();
        assert_eq!(reply, "hello from stdin");
    }

    #[tokio::test]
    async fn missing_binary_is_retryable() {
        let adapter =
            CliProviderAdapter::new(ProviderKind::Mock, "definitely-not-a-binary", Vec::new());
        let err = adapter.send("", "hi").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Retryable(_)));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let adapter = CliProviderAdapter::new(ProviderKind::Mock, "false", Vec::new());
        let err = adapter.send("", "hi").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Retryable(_)));
    }

    #[tokio::test]
    async fn timeout_is_classified_retryable() {
        let adapter = CliProviderAdapter::new(
            ProviderKind::Mock,
            "sleep",
            vec!["5".to_string()],
        )
        .with_timeout(Duration::from_millis(50));
        let err = adapter.send("", "").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Retryable(_)));
    }
}
