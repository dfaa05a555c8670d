//! Shell command execution for health checks.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{EnvkitError, ProvisionError, Result};

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Command output (stdout).
    pub stdout: String,
    /// Command error output (stderr).
    pub stderr: String,
    /// Exit code if available.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Returns trimmed stdout, or trimmed stderr when stdout is blank.
    #[must_use]
    pub fn summary(&self) -> String {
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            self.stderr.trim().to_string()
        } else {
            stdout.to_string()
        }
    }
}

/// Runs shell commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` and captures its output.
    async fn run(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands with `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("Running: {command}");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| {
                EnvkitError::Provision(ProvisionError::CheckFailed {
                    name: command.to_string(),
                    message: e.to_string(),
                })
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        })
    }
}
