//! Shell based command executor

use tokio::process::Command;
use tracing::debug;

use crate::{
    backend::{CommandExecutor, CommandOutput},
    core::error::{CommandError, CommandResult},
};

/// Runs command lines through `/bin/sh -c`
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
        }
    }

    /// Use a different shell binary
    pub fn with_shell(shell: String) -> Self {
        Self { shell }
    }

    /// Pick the text worth reporting: stderr if the command wrote any, stdout otherwise
    fn diagnostic(stdout: &[u8], stderr: &[u8]) -> String {
        let stderr = String::from_utf8_lossy(stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }

        String::from_utf8_lossy(stdout).trim().to_string()
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> CommandResult<CommandOutput> {
        let output = Command::new(&self.shell)
            .args(["-c", command])
            .output()
            .await
            .map_err(|e| CommandError::SpawnFailed(format!("{}: {}", self.shell, e)))?;

        let diagnostic = Self::diagnostic(&output.stdout, &output.stderr);
        let code = output.status.code();
        debug!(?code, "Command finished");

        if code.is_none() {
            // Killed by a signal
            return Err(CommandError::Abnormal(format!(
                "{} ({})",
                output.status, diagnostic
            )));
        }

        Ok(CommandOutput {
            success: output.status.success(),
            code,
            diagnostic,
        })
    }
}
